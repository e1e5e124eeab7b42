//! Basic walkthrough of a quickwire container.
//!
//! Run with `RUST_LOG=quickwire_container=debug cargo run -p quickwire --example basic`
//! to see the resolution trace.

use std::sync::Arc;

use quickwire::logging;
use quickwire::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Injectable for Database {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::interface::<Config>(),
            Dependency::interface::<dyn Logger>(),
        ]
    }

    fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError> {
        let config: Arc<Config> = args.next()?;
        Ok(Database {
            url: config.database_url.clone(),
            logger: args.next()?,
        })
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

impl Injectable for UserRepository {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<Database>()]
    }

    fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError> {
        Ok(UserRepository { db: args.next()? })
    }
}

/// Supplied by the caller of each resolve, like an incoming request.
struct Request {
    user_id: u64,
}

struct UserService {
    request: Arc<Request>,
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn current_user(&self) -> String {
        self.logger.log(&format!("Getting user {}", self.request.user_id));
        self.repo.find_user(self.request.user_id)
    }
}

impl Injectable for UserService {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::interface::<Request>(),
            Dependency::of::<UserRepository>(),
            Dependency::interface::<dyn Logger>(),
        ]
    }

    fn construct(args: &mut Resolved) -> std::result::Result<Self, BoxError> {
        Ok(UserService {
            request: args.next()?,
            repo: args.next()?,
            logger: args.next()?,
        })
    }
}

/// Infrastructure registrations grouped together.
struct InfrastructureModule;

impl Module for InfrastructureModule {
    fn register(&self, container: &Container) -> Result<()> {
        container.register_instance(Arc::new(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        }))?;
        container.register_instance::<dyn Logger>(Arc::new(ConsoleLogger))?;
        container.register_singleton::<Database>()
    }
}

fn main() -> Result<()> {
    logging::init();

    // Build the container
    let container = Container::new();
    container.install(&InfrastructureModule)?;
    container.register_resolution_context::<Request>()?;
    container.seal()?;

    println!("Container sealed: {container:?}");

    // Resolve a registered instance
    let config: Arc<Config> = container.resolve_dyn()?;
    println!("Config: database_url={}, debug={}", config.database_url, config.debug);

    // Each call supplies its own request; the database is shared
    let first: Arc<UserService> =
        container.resolve_with(&ContextValues::new().with(Arc::new(Request { user_id: 42 })))?;
    println!("{}", first.current_user());

    let second: Arc<UserService> =
        container.resolve_with(&ContextValues::new().with(Arc::new(Request { user_id: 7 })))?;
    println!("{}", second.current_user());

    println!(
        "Database shared between calls: {}",
        Arc::ptr_eq(&first.repo.db, &second.repo.db)
    );

    // Without a request the service cannot be built
    if let Err(err) = container.resolve::<UserService>() {
        println!("Expected failure: {err}");
    }

    Ok(())
}
