//! Layered service wiring (database -> repository -> service -> handler)
//! driven by simulated requests instead of a real HTTP listener.
//!
//! Run with `cargo run -p inject --example web_service`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use common::{init_logging, LoggingConfig, OperationTimer};
use inject::{provides, Factory, Lifecycle, Registry, RegistryBuilder, RegistryConfig};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

trait Database: Send + Sync {
    fn get_user(&self, id: u64) -> Result<User>;
    fn create_user(&self, name: &str, email: &str) -> Result<User>;
    fn all_users(&self) -> Vec<User>;
}

trait UserRepository: Send + Sync {
    fn get_by_id(&self, id: u64) -> Result<User>;
    fn create(&self, name: &str, email: &str) -> Result<User>;
    fn get_all(&self) -> Vec<User>;
}

trait UserService: Send + Sync {
    fn get_user(&self, id: u64) -> Result<User>;
    fn create_user(&self, name: &str, email: &str) -> Result<User>;
    fn all_users(&self) -> Vec<User>;
}

struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!("{}", message);
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }
}

struct InMemoryDatabase {
    users: Mutex<BTreeMap<u64, User>>,
    logger: Arc<dyn Logger>,
}

impl Database for InMemoryDatabase {
    fn get_user(&self, id: u64) -> Result<User> {
        self.logger.info(&format!("database: getting user {}", id));
        self.users
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("user with id {} not found", id))
    }

    fn create_user(&self, name: &str, email: &str) -> Result<User> {
        self.logger.info(&format!("database: creating user {}", name));
        let mut users = self.users.lock();
        let id = users.keys().next_back().map_or(1, |last| last + 1);
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    fn all_users(&self) -> Vec<User> {
        self.logger.info("database: listing users");
        self.users.lock().values().cloned().collect()
    }
}

struct UserRepositoryImpl {
    db: Arc<dyn Database>,
    logger: Arc<dyn Logger>,
}

impl UserRepository for UserRepositoryImpl {
    fn get_by_id(&self, id: u64) -> Result<User> {
        self.logger.info(&format!("repository: getting user {}", id));
        self.db.get_user(id)
    }

    fn create(&self, name: &str, email: &str) -> Result<User> {
        self.logger.info(&format!("repository: creating user {}", name));
        self.db.create_user(name, email)
    }

    fn get_all(&self) -> Vec<User> {
        self.logger.info("repository: listing users");
        self.db.all_users()
    }
}

struct UserServiceImpl {
    repo: Arc<dyn UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService for UserServiceImpl {
    fn get_user(&self, id: u64) -> Result<User> {
        self.logger.info(&format!("service: getting user {}", id));
        self.repo.get_by_id(id)
    }

    fn create_user(&self, name: &str, email: &str) -> Result<User> {
        self.logger.info(&format!("service: creating user {}", name));
        self.repo.create(name, email)
    }

    fn all_users(&self) -> Vec<User> {
        self.logger.info("service: listing users");
        self.repo.get_all()
    }
}

provides!(TracingLogger => dyn Logger);
provides!(InMemoryDatabase => dyn Database);
provides!(UserRepositoryImpl => dyn UserRepository);
provides!(UserServiceImpl => dyn UserService);

/// Minimal request model standing in for an HTTP request
enum Request<'a> {
    ListUsers,
    GetUser(&'a str),
    CreateUser { name: &'a str, email: &'a str },
}

struct Response {
    status: u16,
    body: serde_json::Value,
}

struct UserHandler {
    users: Arc<dyn UserService>,
    logger: Arc<dyn Logger>,
}

impl UserHandler {
    fn handle(&self, request: Request<'_>) -> Response {
        match request {
            Request::ListUsers => Response {
                status: 200,
                body: json!(self.users.all_users()),
            },
            Request::GetUser(raw_id) => {
                let Ok(id) = raw_id.parse::<u64>() else {
                    self.logger.error(&format!("invalid user id: {}", raw_id));
                    return Response {
                        status: 400,
                        body: json!({ "error": "invalid user id" }),
                    };
                };
                match self.users.get_user(id) {
                    Ok(user) => Response {
                        status: 200,
                        body: json!(user),
                    },
                    Err(err) => {
                        self.logger.error(&format!("user not found: {}", err));
                        Response {
                            status: 404,
                            body: json!({ "error": "user not found" }),
                        }
                    }
                }
            }
            Request::CreateUser { name, email } => {
                if name.is_empty() || email.is_empty() {
                    self.logger.error("missing name or email");
                    return Response {
                        status: 400,
                        body: json!({ "error": "name and email required" }),
                    };
                }
                match self.users.create_user(name, email) {
                    Ok(user) => Response {
                        status: 201,
                        body: json!(user),
                    },
                    Err(err) => {
                        self.logger.error(&format!("failed to create user: {}", err));
                        Response {
                            status: 500,
                            body: json!({ "error": "failed to create user" }),
                        }
                    }
                }
            }
        }
    }
}

fn build_registry() -> Result<Registry> {
    let registry = RegistryBuilder::new()
        .with_config(RegistryConfig::development())
        .interface::<dyn Logger, TracingLogger, _>(|_| Ok(TracingLogger), Lifecycle::Singleton)
        .register(
            inject::ServiceType::of::<dyn Database>(),
            Factory::inject(|(logger,): (Arc<dyn Logger>,)| {
                Ok(InMemoryDatabase {
                    users: Mutex::new(BTreeMap::new()),
                    logger,
                })
            })
            .with_capability::<InMemoryDatabase, dyn Database>(),
            Lifecycle::Singleton,
        )
        .register(
            inject::ServiceType::of::<dyn UserRepository>(),
            Factory::inject(|(db, logger): (Arc<dyn Database>, Arc<dyn Logger>)| {
                Ok(UserRepositoryImpl { db, logger })
            })
            .with_capability::<UserRepositoryImpl, dyn UserRepository>(),
            Lifecycle::Singleton,
        )
        .register(
            inject::ServiceType::of::<dyn UserService>(),
            Factory::inject(|(repo, logger): (Arc<dyn UserRepository>, Arc<dyn Logger>)| {
                Ok(UserServiceImpl { repo, logger })
            })
            .with_capability::<UserServiceImpl, dyn UserService>(),
            Lifecycle::Singleton,
        )
        .factory(
            Factory::inject(|(users, logger): (Arc<dyn UserService>, Arc<dyn Logger>)| {
                Ok(UserHandler { users, logger })
            }),
            Lifecycle::Transient,
        )
        .build()?;
    Ok(registry)
}

fn main() -> Result<()> {
    init_logging(&LoggingConfig::development().with_env_overrides())?;
    println!("=== Web service wiring ===");

    let timer = OperationTimer::new("build_registry");
    let registry = build_registry();
    timer.finish_with_result(&registry);
    let registry = registry?;

    let users = registry.resolve_as::<dyn UserService>()?;
    users.create_user("Alice Johnson", "alice@example.com")?;
    users.create_user("Bob Smith", "bob@example.com")?;

    let handler = registry.resolve_as::<UserHandler>()?;
    let requests = [
        ("GET /users", Request::ListUsers),
        ("GET /users/1", Request::GetUser("1")),
        ("GET /users/42", Request::GetUser("42")),
        ("GET /users/abc", Request::GetUser("abc")),
        (
            "POST /users",
            Request::CreateUser {
                name: "John",
                email: "john@example.com",
            },
        ),
        (
            "POST /users",
            Request::CreateUser {
                name: "",
                email: "",
            },
        ),
    ];

    for (label, request) in requests {
        let response = handler.handle(request);
        println!("{:<16} -> {} {}", label, response.status, response.body);
    }

    println!(
        "registrations:\n{}",
        serde_json::to_string_pretty(&registry.describe())?
    );
    println!("stats: {}", serde_json::to_string(&registry.stats())?);
    Ok(())
}
