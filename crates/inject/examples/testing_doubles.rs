//! Swapping production services for recording fakes by registering
//! different values under the same capability.
//!
//! Run with `cargo run -p inject --example testing_doubles`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use common::{init_logging, LoggingConfig};
use inject::{provides, Factory, Lifecycle, Registry};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct User {
    name: String,
    email: String,
}

trait EmailService: Send + Sync {
    fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

trait UserRepository: Send + Sync {
    fn save(&self, user: User) -> Result<()>;
    fn find_by_email(&self, email: &str) -> Option<User>;
}

trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

struct RegistrationService {
    email: Arc<dyn EmailService>,
    users: Arc<dyn UserRepository>,
    logger: Arc<dyn Logger>,
}

impl RegistrationService {
    fn register_user(&self, name: &str, email: &str) -> Result<()> {
        self.logger.log(&format!("registering user {} <{}>", name, email));
        if self.users.find_by_email(email).is_some() {
            bail!("user with email {} already exists", email);
        }
        self.users.save(User {
            name: name.to_string(),
            email: email.to_string(),
        })?;
        self.email
            .send_email(email, "Welcome!", &format!("Hello {}, welcome aboard.", name))?;
        self.logger.log(&format!("user {} registered", name));
        Ok(())
    }
}

// Production implementations

struct SmtpEmailService {
    host: String,
}

impl EmailService for SmtpEmailService {
    fn send_email(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        println!("[smtp {}] sending '{}' to {}", self.host, subject, to);
        Ok(())
    }
}

#[derive(Default)]
struct DatabaseUserRepository {
    rows: Mutex<HashMap<String, User>>,
}

impl UserRepository for DatabaseUserRepository {
    fn save(&self, user: User) -> Result<()> {
        self.rows.lock().insert(user.email.clone(), user);
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        self.rows.lock().get(email).cloned()
    }
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        println!("[log] {}", message);
    }
}

provides!(SmtpEmailService => dyn EmailService);
provides!(DatabaseUserRepository => dyn UserRepository);
provides!(ConsoleLogger => dyn Logger);

// Recording fakes

#[derive(Default)]
struct RecordingEmailService {
    sent: Mutex<Vec<(String, String)>>,
}

impl EmailService for RecordingEmailService {
    fn send_email(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        self.sent.lock().push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl Logger for RecordingLogger {
    fn log(&self, message: &str) {
        self.lines.lock().push(message.to_string());
    }
}

fn register_service_under_test(registry: &Registry) -> Result<()> {
    registry.register_factory(
        Factory::inject(
            |(email, users, logger): (
                Arc<dyn EmailService>,
                Arc<dyn UserRepository>,
                Arc<dyn Logger>,
            )| Ok(RegistrationService { email, users, logger }),
        ),
        Lifecycle::Transient,
    )?;
    Ok(())
}

fn production_registry() -> Result<Registry> {
    let registry = Registry::new();
    registry.register_singleton_interface::<dyn Logger, ConsoleLogger, _>(|_| Ok(ConsoleLogger))?;
    registry.register_singleton_interface::<dyn EmailService, SmtpEmailService, _>(|_| {
        Ok(SmtpEmailService {
            host: "smtp.example.com".to_string(),
        })
    })?;
    registry.register_singleton_interface::<dyn UserRepository, DatabaseUserRepository, _>(
        |_| Ok(DatabaseUserRepository::default()),
    )?;
    register_service_under_test(&registry)?;
    Ok(registry)
}

fn main() -> Result<()> {
    init_logging(&LoggingConfig::development().with_env_overrides())?;

    println!("=== Production wiring ===");
    let registry = production_registry()?;
    registry
        .must_resolve::<RegistrationService>()
        .register_user("Alice Johnson", "alice@production.com")?;

    println!("\n=== Test wiring with recording fakes ===");
    let emails = Arc::new(RecordingEmailService::default());
    let logger = Arc::new(RecordingLogger::default());
    let users: Arc<dyn UserRepository> = Arc::new(DatabaseUserRepository::default());

    let registry = Registry::new();
    registry.register_instance::<dyn EmailService>(emails.clone())?;
    registry.register_instance::<dyn Logger>(logger.clone())?;
    registry.register_instance(users)?;
    register_service_under_test(&registry)?;

    let service = registry.must_resolve::<RegistrationService>();
    service.register_user("John Doe", "john@example.com")?;
    let duplicate = service.register_user("John Doe", "john@example.com");

    println!("emails sent: {:?}", emails.sent.lock());
    println!("log lines: {}", logger.lines.lock().len());
    match duplicate {
        Ok(()) => println!("duplicate registration unexpectedly succeeded"),
        Err(err) => println!("duplicate registration rejected: {}", err),
    }

    let stored = registry.must_resolve::<dyn UserRepository>().find_by_email("john@example.com");
    if let Some(user) = stored {
        println!("stored user: {} <{}>", user.name, user.email);
    }
    Ok(())
}
