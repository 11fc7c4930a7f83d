//! User × recipe link sets (favorites, shopping cart) and user → author
//! subscriptions. Every pair is stored as a 16 byte key, first id then second,
//! so a prefix scan over the first id yields its partners in id order.

use crate::database::{deserialize_id, serialize_id, DbError, DbResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Favorite,
    ShoppingCart,
}

impl Relation {
    pub const ALL: [Relation; 2] = [Relation::Favorite, Relation::ShoppingCart];

    fn tree_name(self) -> &'static [u8] {
        match self {
            Relation::Favorite => b"favorites",
            Relation::ShoppingCart => b"shopping_carts",
        }
    }
}

const SUBSCRIPTIONS: &[u8] = b"subscriptions";

fn pair_key(first: u64, second: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&serialize_id(first));
    key[8..].copy_from_slice(&serialize_id(second));
    key
}

fn partner<K: AsRef<[u8]>>(key: K) -> DbResult<u64> {
    let key = key.as_ref();
    if key.len() != 16 {
        return Err(DbError::MalformedKey(key.len()));
    }
    deserialize_id(&key[8..])
}

/// Inserts the pair unless it is already present.
fn insert_unique(tree: &sled::Tree, key: [u8; 16]) -> DbResult<bool> {
    Ok(tree
        .compare_and_swap(key, None::<&[u8]>, Some(&b""[..]))?
        .is_ok())
}

fn partners(tree: &sled::Tree, first: u64) -> DbResult<Vec<u64>> {
    tree.scan_prefix(serialize_id(first))
        .keys()
        .map(|key| partner(key?))
        .collect()
}

pub trait RelationDb {
    type Error;
    /// Returns `false` if the pair was already present.
    fn add_relation(&self, relation: Relation, user_id: u64, recipe_id: u64)
        -> Result<bool, Self::Error>;
    /// Returns `false` if the pair was not present.
    fn remove_relation(&self, relation: Relation, user_id: u64, recipe_id: u64)
        -> Result<bool, Self::Error>;
    fn has_relation(&self, relation: Relation, user_id: u64, recipe_id: u64)
        -> Result<bool, Self::Error>;
    fn related_recipes(&self, relation: Relation, user_id: u64) -> Result<Vec<u64>, Self::Error>;
    /// Drops every favorite and cart entry that points at the recipe.
    fn forget_recipe(&self, recipe_id: u64) -> Result<(), Self::Error>;

    fn subscribe(&self, user_id: u64, author_id: u64) -> Result<bool, Self::Error>;
    fn unsubscribe(&self, user_id: u64, author_id: u64) -> Result<bool, Self::Error>;
    fn is_subscribed(&self, user_id: u64, author_id: u64) -> Result<bool, Self::Error>;
    fn subscriptions(&self, user_id: u64) -> Result<Vec<u64>, Self::Error>;
}

impl RelationDb for sled::Db {
    type Error = DbError;

    fn add_relation(&self, relation: Relation, user_id: u64, recipe_id: u64) -> DbResult<bool> {
        let tree = self.open_tree(relation.tree_name())?;
        insert_unique(&tree, pair_key(user_id, recipe_id))
    }

    fn remove_relation(&self, relation: Relation, user_id: u64, recipe_id: u64) -> DbResult<bool> {
        let tree = self.open_tree(relation.tree_name())?;
        Ok(tree.remove(pair_key(user_id, recipe_id))?.is_some())
    }

    fn has_relation(&self, relation: Relation, user_id: u64, recipe_id: u64) -> DbResult<bool> {
        let tree = self.open_tree(relation.tree_name())?;
        Ok(tree.contains_key(pair_key(user_id, recipe_id))?)
    }

    fn related_recipes(&self, relation: Relation, user_id: u64) -> DbResult<Vec<u64>> {
        let tree = self.open_tree(relation.tree_name())?;
        partners(&tree, user_id)
    }

    fn forget_recipe(&self, recipe_id: u64) -> DbResult<()> {
        for relation in Relation::ALL.iter() {
            let tree = self.open_tree(relation.tree_name())?;
            for key in tree.iter().keys() {
                let key = key?;
                if partner(&key)? == recipe_id {
                    tree.remove(key)?;
                }
            }
        }
        Ok(())
    }

    fn subscribe(&self, user_id: u64, author_id: u64) -> DbResult<bool> {
        let tree = self.open_tree(SUBSCRIPTIONS)?;
        insert_unique(&tree, pair_key(user_id, author_id))
    }

    fn unsubscribe(&self, user_id: u64, author_id: u64) -> DbResult<bool> {
        let tree = self.open_tree(SUBSCRIPTIONS)?;
        Ok(tree.remove(pair_key(user_id, author_id))?.is_some())
    }

    fn is_subscribed(&self, user_id: u64, author_id: u64) -> DbResult<bool> {
        let tree = self.open_tree(SUBSCRIPTIONS)?;
        Ok(tree.contains_key(pair_key(user_id, author_id))?)
    }

    fn subscriptions(&self, user_id: u64) -> DbResult<Vec<u64>> {
        let tree = self.open_tree(SUBSCRIPTIONS)?;
        partners(&tree, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temporary_db;

    #[test]
    fn duplicate_add_is_rejected_and_cardinality_unchanged() {
        let db = temporary_db();
        assert!(db.add_relation(Relation::ShoppingCart, 1, 10).unwrap());
        assert!(!db.add_relation(Relation::ShoppingCart, 1, 10).unwrap());
        assert_eq!(db.related_recipes(Relation::ShoppingCart, 1).unwrap(), [10]);
    }

    #[test]
    fn relation_sets_are_independent() {
        let db = temporary_db();
        db.add_relation(Relation::Favorite, 1, 10).unwrap();
        assert!(!db.has_relation(Relation::ShoppingCart, 1, 10).unwrap());
        assert!(!db.remove_relation(Relation::ShoppingCart, 1, 10).unwrap());
        assert!(db.remove_relation(Relation::Favorite, 1, 10).unwrap());
        assert!(db.related_recipes(Relation::Favorite, 1).unwrap().is_empty());
    }

    #[test]
    fn related_recipes_are_scoped_to_the_user() {
        let db = temporary_db();
        db.add_relation(Relation::ShoppingCart, 1, 12).unwrap();
        db.add_relation(Relation::ShoppingCart, 1, 11).unwrap();
        db.add_relation(Relation::ShoppingCart, 2, 13).unwrap();
        assert_eq!(db.related_recipes(Relation::ShoppingCart, 1).unwrap(), [11, 12]);
        assert_eq!(db.related_recipes(Relation::ShoppingCart, 2).unwrap(), [13]);
    }

    #[test]
    fn forget_recipe_clears_both_sets_for_every_user() {
        let db = temporary_db();
        db.add_relation(Relation::ShoppingCart, 1, 10).unwrap();
        db.add_relation(Relation::ShoppingCart, 2, 10).unwrap();
        db.add_relation(Relation::Favorite, 1, 10).unwrap();
        db.add_relation(Relation::ShoppingCart, 1, 11).unwrap();
        db.forget_recipe(10).unwrap();
        assert_eq!(db.related_recipes(Relation::ShoppingCart, 1).unwrap(), [11]);
        assert!(db.related_recipes(Relation::ShoppingCart, 2).unwrap().is_empty());
        assert!(!db.has_relation(Relation::Favorite, 1, 10).unwrap());
    }

    #[test]
    fn subscriptions() {
        let db = temporary_db();
        assert!(db.subscribe(1, 2).unwrap());
        assert!(!db.subscribe(1, 2).unwrap());
        assert!(db.subscribe(1, 3).unwrap());
        assert!(db.is_subscribed(1, 2).unwrap());
        assert!(!db.is_subscribed(2, 1).unwrap());
        assert_eq!(db.subscriptions(1).unwrap(), [2, 3]);
        assert!(db.unsubscribe(1, 2).unwrap());
        assert!(!db.unsubscribe(1, 2).unwrap());
        assert_eq!(db.subscriptions(1).unwrap(), [3]);
    }
}
