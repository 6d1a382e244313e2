//! Singleton logger shared by transient user services.
//!
//! Run with `cargo run -p inject --example basic`.

use std::sync::Arc;

use anyhow::Result;
use common::{init_logging, LoggingConfig};
use inject::{provides, Registry};

trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

struct ConsoleLogger {
    prefix: String,
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        println!("[{}] {}", self.prefix, message);
    }
}

provides!(ConsoleLogger => dyn Logger);

struct UserService {
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn create_user(&self, name: &str) {
        self.logger.log(&format!("Creating user: {}", name));
    }

    fn delete_user(&self, name: &str) {
        self.logger.log(&format!("Deleting user: {}", name));
    }
}

fn main() -> Result<()> {
    init_logging(&LoggingConfig::development().with_env_overrides())?;
    println!("=== Basic dependency injection ===");

    let registry = Registry::new();
    registry.register_singleton_interface::<dyn Logger, ConsoleLogger, _>(|_| {
        Ok(ConsoleLogger {
            prefix: "APP".to_string(),
        })
    })?;
    registry.register_transient_type(|registry| {
        Ok(UserService {
            logger: registry.resolve_as::<dyn Logger>()?,
        })
    })?;

    let first = registry.must_resolve::<UserService>();
    let second = registry.must_resolve::<UserService>();

    first.create_user("Alice");
    second.create_user("Bob");
    first.delete_user("Alice");

    println!("UserService #1 at {:p}", Arc::as_ptr(&first));
    println!("UserService #2 at {:p}", Arc::as_ptr(&second));
    println!("Same UserService instance? {}", Arc::ptr_eq(&first, &second));
    println!("Same Logger instance? {}", Arc::ptr_eq(&first.logger, &second.logger));
    Ok(())
}
