#[cfg(test)]
#[macro_use]
mod test_support;

mod auth;
mod config;
mod database;
mod error;
mod ingredients;
mod model;
mod pagination;
mod recipes;
mod relations;
mod routes;
mod shopping_list;
mod users;
mod validation;
mod views;

use actix_web::{middleware::Logger, web, App, HttpServer};
use config::Config;
use log::{error, info};
use std::{fs::File, io};

pub(crate) type Db = web::Data<sled::Db>;

fn fatal<E: std::fmt::Display>(message: &'static str) -> impl FnOnce(E) -> io::Error {
    move |err| {
        error!("{}: {}", message, err);
        io::Error::new(io::ErrorKind::Other, format!("{}: {}", message, err))
    }
}

fn open_database(config: &Config) -> sled::Result<sled::Db> {
    match &config.database_path {
        Some(path) => {
            info!("Opening database at {}", path.display());
            sled::open(path)
        }
        None => {
            info!("No database path configured, using a temporary database");
            sled::Config::new().temporary(true).open()
        }
    }
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("foodgram=debug,actix_web=info"),
    )
    .init();

    let config = Config::load().map_err(fatal("Configuration error"))?;
    let db = open_database(&config).map_err(fatal("Cannot open database"))?;
    if let Some(path) = &config.ingredients_path {
        let file = File::open(path).map_err(fatal("Cannot open ingredient fixture"))?;
        ingredients::load_fixture(&db, io::BufReader::new(file))
            .map_err(fatal("Cannot load ingredient fixture"))?;
    }
    let tera = shopping_list::templates().map_err(fatal("Template error"))?;

    let secret_key = config.secret_key.clone();
    let bind_address = config.bind_address();
    let db = web::Data::new(db);
    let config = web::Data::new(config);
    let tera = web::Data::new(tera);
    info!("Listening on {}:{}", bind_address.0, bind_address.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(auth::identity_service(&secret_key))
            .app_data(db.clone())
            .app_data(config.clone())
            .app_data(tera.clone())
            .configure(routes::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
