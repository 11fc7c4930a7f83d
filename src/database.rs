use crate::model::*;
use crate::relations::RelationDb;
use rand::{distributions::Alphanumeric, Rng};
use sled::transaction::{abort, TransactionError, Transactional};
use std::convert::TryInto;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("malformed key of length {0}")]
    MalformedKey(usize),
    #[error("dangling {0} reference: {1}")]
    Dangling(&'static str, u64),
}

pub type DbResult<T> = Result<T, DbError>;

// Big-endian so that tree iteration follows id order.
pub(crate) fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

pub(crate) fn deserialize_id<V: AsRef<[u8]>>(id: V) -> DbResult<u64> {
    let bytes = id.as_ref();
    bytes
        .try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| DbError::MalformedKey(bytes.len()))
}

fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub trait UserDb {
    type Error;
    /// Returns `None` when the email or the username is already registered.
    fn add_user(&self, user: &User) -> Result<Option<u64>, Self::Error>;
    fn get_user(&self, id: u64) -> Result<Option<User>, Self::Error>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<(u64, User)>, Self::Error>;
    fn username_taken(&self, username: &str) -> Result<bool, Self::Error>;
    fn email_taken(&self, email: &str) -> Result<bool, Self::Error>;
    fn update_user(&self, id: u64, user: &User) -> Result<(), Self::Error>;
    /// All users ordered by email.
    fn list_users(&self) -> Result<Vec<(u64, User)>, Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"users_email";
const USERS_USERNAME: &[u8] = b"users_username";

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: &User) -> DbResult<Option<u64>> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        let key = serialize_id(id);
        let value = bincode::serialize(user)?;
        let username = user.username.to_lowercase();
        let result = (&users, &users_email, &users_username).transaction(
            |(users, users_email, users_username)| {
                if users_email
                    .insert(user.email.as_bytes(), &key[..])?
                    .is_some()
                {
                    return abort(());
                }
                if users_username
                    .insert(username.as_bytes(), &key[..])?
                    .is_some()
                {
                    return abort(());
                }
                users.insert(&key[..], value.as_slice())?;
                Ok(())
            },
        );
        match result {
            Ok(()) => Ok(Some(id)),
            Err(TransactionError::Abort(())) => Ok(None),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn get_user(&self, id: u64) -> DbResult<Option<User>> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> DbResult<Option<(u64, User)>> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users = self.open_tree(USERS)?;
        if let Some(id) = users_email.get(email.as_bytes())? {
            let id = deserialize_id(id)?;
            let data = users
                .get(serialize_id(id))?
                .ok_or(DbError::Dangling("user", id))?;
            Ok(Some((id, bincode::deserialize(&data)?)))
        } else {
            Ok(None)
        }
    }

    fn username_taken(&self, username: &str) -> DbResult<bool> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        Ok(users_username.contains_key(username.to_lowercase().as_bytes())?)
    }

    fn email_taken(&self, email: &str) -> DbResult<bool> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        Ok(users_email.contains_key(email.as_bytes())?)
    }

    fn update_user(&self, id: u64, user: &User) -> DbResult<()> {
        let users = self.open_tree(USERS)?;
        users.insert(serialize_id(id), bincode::serialize(user)?)?;
        Ok(())
    }

    fn list_users(&self) -> DbResult<Vec<(u64, User)>> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        let users = self.open_tree(USERS)?;
        users_email
            .iter()
            .map(|entry| -> DbResult<(u64, User)> {
                let (_email, id) = entry?;
                let id = deserialize_id(id)?;
                let data = users
                    .get(serialize_id(id))?
                    .ok_or(DbError::Dangling("user", id))?;
                Ok((id, bincode::deserialize(&data)?))
            })
            .collect()
    }
}

pub trait IngredientDb {
    type Error;
    fn add_ingredient(&self, ingredient: &Ingredient) -> Result<u64, Self::Error>;
    fn get_ingredient(&self, id: u64) -> Result<Option<Ingredient>, Self::Error>;
    /// Ingredients sorted by name, optionally restricted to a case-insensitive name prefix.
    fn search_ingredients(&self, prefix: Option<&str>)
        -> Result<Vec<(u64, Ingredient)>, Self::Error>;
    fn has_ingredients(&self) -> Result<bool, Self::Error>;
}

const INGREDIENTS: &[u8] = b"ingredients";

impl IngredientDb for sled::Db {
    type Error = DbError;

    fn add_ingredient(&self, ingredient: &Ingredient) -> DbResult<u64> {
        let ingredients = self.open_tree(INGREDIENTS)?;
        let id = self.generate_id()?;
        ingredients.insert(serialize_id(id), bincode::serialize(ingredient)?)?;
        Ok(id)
    }

    fn get_ingredient(&self, id: u64) -> DbResult<Option<Ingredient>> {
        let ingredients = self.open_tree(INGREDIENTS)?;
        match ingredients.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn search_ingredients(&self, prefix: Option<&str>) -> DbResult<Vec<(u64, Ingredient)>> {
        let ingredients = self.open_tree(INGREDIENTS)?;
        let prefix = prefix.map(str::to_lowercase);
        let mut found = Vec::new();
        for entry in ingredients.iter() {
            let (id, data) = entry?;
            let ingredient: Ingredient = bincode::deserialize(&data)?;
            if let Some(prefix) = &prefix {
                if !ingredient.name.to_lowercase().starts_with(prefix.as_str()) {
                    continue;
                }
            }
            found.push((deserialize_id(id)?, ingredient));
        }
        found.sort_by(|(a_id, a), (b_id, b)| a.name.cmp(&b.name).then(a_id.cmp(b_id)));
        Ok(found)
    }

    fn has_ingredients(&self) -> DbResult<bool> {
        let ingredients = self.open_tree(INGREDIENTS)?;
        Ok(!ingredients.is_empty())
    }
}

pub trait RecipeDb {
    type Error;
    fn add_recipe(&self, recipe: &Recipe) -> Result<u64, Self::Error>;
    fn get_recipe(&self, id: u64) -> Result<Option<Recipe>, Self::Error>;
    fn update_recipe(&self, id: u64, recipe: &Recipe) -> Result<(), Self::Error>;
    /// Removes the recipe together with every cart, favorite and short link entry
    /// pointing at it. Returns `false` if there was no such recipe.
    fn delete_recipe(&self, id: u64) -> Result<bool, Self::Error>;
    /// All recipes, newest first.
    fn list_recipes(&self) -> Result<Vec<(u64, Recipe)>, Self::Error>;
    fn recipes_by_author(&self, author_id: u64) -> Result<Vec<(u64, Recipe)>, Self::Error>;
    /// Returns the recipe's short link code, issuing one on first use.
    fn short_link(&self, recipe_id: u64) -> Result<String, Self::Error>;
    fn resolve_short_link(&self, code: &str) -> Result<Option<u64>, Self::Error>;
}

const RECIPES: &[u8] = b"recipes";
const SHORT_LINKS: &[u8] = b"short_links";
const RECIPE_SHORT_LINKS: &[u8] = b"recipe_short_links";
pub const SHORT_LINK_LEN: usize = 6;

impl RecipeDb for sled::Db {
    type Error = DbError;

    fn add_recipe(&self, recipe: &Recipe) -> DbResult<u64> {
        let recipes = self.open_tree(RECIPES)?;
        let id = self.generate_id()?;
        recipes.insert(serialize_id(id), bincode::serialize(recipe)?)?;
        Ok(id)
    }

    fn get_recipe(&self, id: u64) -> DbResult<Option<Recipe>> {
        let recipes = self.open_tree(RECIPES)?;
        match recipes.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn update_recipe(&self, id: u64, recipe: &Recipe) -> DbResult<()> {
        let recipes = self.open_tree(RECIPES)?;
        recipes.insert(serialize_id(id), bincode::serialize(recipe)?)?;
        Ok(())
    }

    fn delete_recipe(&self, id: u64) -> DbResult<bool> {
        let recipes = self.open_tree(RECIPES)?;
        if recipes.remove(serialize_id(id))?.is_none() {
            return Ok(false);
        }
        self.forget_recipe(id)?;
        let recipe_links = self.open_tree(RECIPE_SHORT_LINKS)?;
        if let Some(code) = recipe_links.remove(serialize_id(id))? {
            self.open_tree(SHORT_LINKS)?.remove(code)?;
        }
        Ok(true)
    }

    fn list_recipes(&self) -> DbResult<Vec<(u64, Recipe)>> {
        let recipes = self.open_tree(RECIPES)?;
        recipes
            .iter()
            .rev()
            .map(|entry| -> DbResult<(u64, Recipe)> {
                let (id, data) = entry?;
                Ok((deserialize_id(id)?, bincode::deserialize(&data)?))
            })
            .collect()
    }

    fn recipes_by_author(&self, author_id: u64) -> DbResult<Vec<(u64, Recipe)>> {
        let mut recipes = self.list_recipes()?;
        recipes.retain(|(_, recipe)| recipe.author_id == author_id);
        Ok(recipes)
    }

    fn short_link(&self, recipe_id: u64) -> DbResult<String> {
        let links = self.open_tree(SHORT_LINKS)?;
        let recipe_links = self.open_tree(RECIPE_SHORT_LINKS)?;
        let key = serialize_id(recipe_id);
        if let Some(code) = recipe_links.get(key)? {
            return Ok(String::from_utf8_lossy(&code).into_owned());
        }
        loop {
            let code = random_code(SHORT_LINK_LEN);
            if links
                .compare_and_swap(code.as_bytes(), None::<&[u8]>, Some(&key[..]))?
                .is_ok()
            {
                recipe_links.insert(key, code.as_bytes())?;
                return Ok(code);
            }
        }
    }

    fn resolve_short_link(&self, code: &str) -> DbResult<Option<u64>> {
        let links = self.open_tree(SHORT_LINKS)?;
        links.get(code.as_bytes())?.map(deserialize_id).transpose()
    }
}

pub trait TokenDb {
    type Error;
    /// Returns the user's live token, creating one if needed.
    fn issue_token(&self, user_id: u64) -> Result<String, Self::Error>;
    fn token_user(&self, token: &str) -> Result<Option<u64>, Self::Error>;
    /// Returns `false` if the user had no live token.
    fn revoke_token(&self, user_id: u64) -> Result<bool, Self::Error>;
}

const TOKENS: &[u8] = b"tokens";
const USER_TOKENS: &[u8] = b"user_tokens";
const TOKEN_LEN: usize = 40;

impl TokenDb for sled::Db {
    type Error = DbError;

    fn issue_token(&self, user_id: u64) -> DbResult<String> {
        let tokens = self.open_tree(TOKENS)?;
        let user_tokens = self.open_tree(USER_TOKENS)?;
        let key = serialize_id(user_id);
        if let Some(token) = user_tokens.get(key)? {
            return Ok(String::from_utf8_lossy(&token).into_owned());
        }
        let token = random_code(TOKEN_LEN);
        let result = (&tokens, &user_tokens).transaction(|(tokens, user_tokens)| {
            if user_tokens.insert(&key[..], token.as_bytes())?.is_some() {
                return abort(());
            }
            tokens.insert(token.as_bytes(), &key[..])?;
            Ok(())
        });
        match result {
            Ok(()) => Ok(token),
            // A concurrent login won the race; hand out its token.
            Err(TransactionError::Abort(())) => {
                let token = user_tokens.get(key)?.ok_or(DbError::Dangling("token", user_id))?;
                Ok(String::from_utf8_lossy(&token).into_owned())
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn token_user(&self, token: &str) -> DbResult<Option<u64>> {
        let tokens = self.open_tree(TOKENS)?;
        tokens.get(token.as_bytes())?.map(deserialize_id).transpose()
    }

    fn revoke_token(&self, user_id: u64) -> DbResult<bool> {
        let tokens = self.open_tree(TOKENS)?;
        let user_tokens = self.open_tree(USER_TOKENS)?;
        match user_tokens.remove(serialize_id(user_id))? {
            Some(token) => {
                tokens.remove(token)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{recipe, temporary_db, user};

    #[test]
    fn add_user_rejects_duplicate_email_and_username() {
        let db = temporary_db();
        let first = db.add_user(&user("alice", "alice@example.com")).unwrap();
        assert!(first.is_some());
        assert_eq!(db.add_user(&user("bob", "alice@example.com")).unwrap(), None);
        assert_eq!(db.add_user(&user("ALICE", "other@example.com")).unwrap(), None);
        assert!(db.username_taken("Alice").unwrap());
        assert!(db.email_taken("alice@example.com").unwrap());
        assert!(!db.email_taken("bob@example.com").unwrap());
    }

    #[test]
    fn users_are_listed_by_email() {
        let db = temporary_db();
        db.add_user(&user("zed", "b@example.com")).unwrap();
        db.add_user(&user("amy", "c@example.com")).unwrap();
        db.add_user(&user("bob", "a@example.com")).unwrap();
        let emails: Vec<_> = db
            .list_users()
            .unwrap()
            .into_iter()
            .map(|(_, user)| user.email)
            .collect();
        assert_eq!(emails, ["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn ingredient_search_is_case_insensitive_prefix_sorted_by_name() {
        let db = temporary_db();
        for name in &["сахар", "соль", "Сахарная пудра", "мука"] {
            db.add_ingredient(&Ingredient {
                name: name.to_string(),
                measurement_unit: "г".to_owned(),
            })
            .unwrap();
        }
        let names: Vec<_> = db
            .search_ingredients(Some("САХ"))
            .unwrap()
            .into_iter()
            .map(|(_, ingredient)| ingredient.name)
            .collect();
        assert_eq!(names, ["Сахарная пудра", "сахар"]);
        assert_eq!(db.search_ingredients(None).unwrap().len(), 4);
    }

    #[test]
    fn recipes_are_listed_newest_first() {
        let db = temporary_db();
        let first = db.add_recipe(&recipe(1, "first", vec![])).unwrap();
        let second = db.add_recipe(&recipe(1, "second", vec![])).unwrap();
        db.add_recipe(&recipe(2, "other", vec![])).unwrap();
        let ids: Vec<_> = db
            .recipes_by_author(1)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, [second, first]);
    }

    #[test]
    fn short_link_is_stable_and_dropped_with_recipe() {
        let db = temporary_db();
        let id = db.add_recipe(&recipe(1, "soup", vec![])).unwrap();
        let code = db.short_link(id).unwrap();
        assert_eq!(code.len(), SHORT_LINK_LEN);
        assert_eq!(db.short_link(id).unwrap(), code);
        assert_eq!(db.resolve_short_link(&code).unwrap(), Some(id));
        assert!(db.delete_recipe(id).unwrap());
        assert_eq!(db.resolve_short_link(&code).unwrap(), None);
        assert!(!db.delete_recipe(id).unwrap());
    }

    #[test]
    fn token_lifecycle() {
        let db = temporary_db();
        let token = db.issue_token(7).unwrap();
        assert_eq!(db.issue_token(7).unwrap(), token);
        assert_eq!(db.token_user(&token).unwrap(), Some(7));
        assert!(db.revoke_token(7).unwrap());
        assert_eq!(db.token_user(&token).unwrap(), None);
        assert!(!db.revoke_token(7).unwrap());
    }
}
