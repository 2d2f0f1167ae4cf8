//! Shared services and wirings for the end-to-end tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use lifestyle_di::{
    ConstructionParams, DIContainer, DIResult, ImplementationCatalog, ServiceKey, ServiceLifetime,
    ServiceProvider,
};

static INIT: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

pub trait Logger: Send + Sync {
    fn log(&self, message: &str) -> String;
}

pub trait Database: Send + Sync {
    fn query(&self, sql: &str) -> String;
}

pub trait EmailService: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> String;
}

pub const LOGGER: ServiceKey<dyn Logger> = ServiceKey::new("logger");
pub const DATABASE: ServiceKey<dyn Database> = ServiceKey::new("database");
pub const EMAIL: ServiceKey<dyn EmailService> = ServiceKey::new("email");

pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) -> String {
        format!("[CONSOLE] {}", message)
    }
}

pub struct FileLogger {
    filename: String,
}

impl FileLogger {
    pub fn from_params(params: &ConstructionParams) -> anyhow::Result<Arc<dyn Logger>> {
        let filename = params.get_str("filename").unwrap_or("log.txt").to_string();
        Ok(Arc::new(Self { filename }))
    }
}

impl Logger for FileLogger {
    fn log(&self, message: &str) -> String {
        format!("[FILE {}] {}", self.filename, message)
    }
}

pub struct MockDatabase;

impl Database for MockDatabase {
    fn query(&self, sql: &str) -> String {
        format!("Mocked: {}", sql)
    }
}

pub struct SqlDatabase {
    connection_string: String,
}

impl SqlDatabase {
    pub fn from_params(params: &ConstructionParams) -> anyhow::Result<Arc<dyn Database>> {
        let connection_string = params.require_str("connection_string")?.to_string();
        Ok(Arc::new(Self { connection_string }))
    }
}

impl Database for SqlDatabase {
    fn query(&self, sql: &str) -> String {
        format!("Executed: {} on {}", sql, self.connection_string)
    }
}

pub struct MockEmailService;

impl EmailService for MockEmailService {
    fn send(&self, to: &str, subject: &str, _body: &str) -> String {
        format!("Mock email to {}: {}", to, subject)
    }
}

pub struct SmtpEmailService {
    smtp_server: String,
}

impl SmtpEmailService {
    pub fn from_params(params: &ConstructionParams) -> anyhow::Result<Arc<dyn EmailService>> {
        let smtp_server = params.require_str("smtp_server")?.to_string();
        Ok(Arc::new(Self { smtp_server }))
    }
}

impl EmailService for SmtpEmailService {
    fn send(&self, to: &str, subject: &str, _body: &str) -> String {
        format!("Sent via {} to {}: {}", self.smtp_server, to, subject)
    }
}

/// Mocks everywhere; the database is per-request, email is scoped
pub struct DebugWiring;

impl ServiceProvider for DebugWiring {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn register(&self, container: &DIContainer) -> DIResult<()> {
        container.register_singleton(LOGGER, |_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>));
        container.register_per_request(DATABASE, |_| {
            Ok(Arc::new(MockDatabase) as Arc<dyn Database>)
        });
        container.register_scoped(EMAIL, |_| {
            Ok(Arc::new(MockEmailService) as Arc<dyn EmailService>)
        });
        Ok(())
    }
}

/// Real backends; the database is scoped to a unit of work
pub struct ReleaseWiring;

impl ServiceProvider for ReleaseWiring {
    fn name(&self) -> &'static str {
        "release"
    }

    fn register(&self, container: &DIContainer) -> DIResult<()> {
        container.register_with_params(
            LOGGER,
            ServiceLifetime::Singleton,
            ConstructionParams::new().with("filename", "app.log"),
            FileLogger::from_params,
        );
        container.register_with_params(
            DATABASE,
            ServiceLifetime::Scoped,
            ConstructionParams::new().with("connection_string", "server=prod;db=app"),
            SqlDatabase::from_params,
        );
        container.register_with_params(
            EMAIL,
            ServiceLifetime::Singleton,
            ConstructionParams::new().with("smtp_server", "smtp.example.com"),
            SmtpEmailService::from_params,
        );
        Ok(())
    }
}

/// Every implementation, addressable by name from a wiring profile
pub fn catalog() -> ImplementationCatalog {
    let mut catalog = ImplementationCatalog::new();
    catalog
        .add(LOGGER, "console", |_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>))
        .add(LOGGER, "file", FileLogger::from_params)
        .add(DATABASE, "mock", |_| Ok(Arc::new(MockDatabase) as Arc<dyn Database>))
        .add(DATABASE, "sql", SqlDatabase::from_params)
        .add(EMAIL, "mock", |_| {
            Ok(Arc::new(MockEmailService) as Arc<dyn EmailService>)
        })
        .add(EMAIL, "smtp", SmtpEmailService::from_params);
    catalog
}
