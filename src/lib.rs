// Disposable MySQL servers in containers for integration tests
//
// `Mysqld::new` launches a container, waits until mysqld accepts connections
// and hands back the DSN; `Mysqld::stop` kills and removes it.

pub mod clock;
pub mod config;
pub mod docker;
pub mod environment;
pub mod errors;
pub mod mysqld;
pub mod probe;

pub use config::MysqldConfig;
pub use errors::{MysqlTestError, Result};
pub use mysqld::{Mysqld, State, StopReport};
