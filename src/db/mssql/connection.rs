use std::fmt;

use log::info;
use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::Credentials;
use crate::db::mssql::driver::Driver;
use crate::error::ExtractError;

pub type MssqlClient = Client<Compat<TcpStream>>;

pub const DEFAULT_PORT: u16 = 1433;

/// Everything needed to open one session: who, where, and through which
/// driver profile.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub driver: Driver,
    /// Skip validation of the server certificate.  Only turned on for
    /// Driver 18, which otherwise rejects the self-signed certificates our
    /// servers present.
    pub trust_server_certificate: bool,
}

impl ConnectionDescriptor {
    pub fn new(credentials: &Credentials, driver: Driver) -> Result<Self, ExtractError> {
        let (host, port) = parse_server(&credentials.server)?;
        let trust_server_certificate = driver.trust_server_certificate();
        Ok(ConnectionDescriptor {
            host,
            port,
            database: credentials.database.clone(),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            driver,
            trust_server_certificate,
        })
    }

    /// The ODBC style connection string, e.g.
    /// `DRIVER={ODBC Driver 18 for SQL Server};SERVER=db,1433;DATABASE=x;UID=u;PWD=p;TrustServerCertificate=yes;`
    pub fn connection_string(&self) -> String {
        let mut s = format!(
            "DRIVER={{{}}};SERVER={},{};DATABASE={};UID={};PWD={};",
            self.driver, self.host, self.port, self.database, self.username, self.password
        );
        if self.trust_server_certificate {
            s.push_str("TrustServerCertificate=yes;");
        }
        s
    }

    /// Driver 18 encrypts the whole session, older drivers only the login
    /// packet.
    pub fn encryption(&self) -> EncryptionLevel {
        if self.driver.major_version() == Some(18) {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        }
    }

    /// Whether the server certificate is accepted without validation.
    /// Driver 18 skips it through TrustServerCertificate=yes.  Drivers 17 and
    /// older never validate the certificate of login-only encryption.
    pub fn skips_certificate_validation(&self) -> bool {
        self.trust_server_certificate || matches!(self.encryption(), EncryptionLevel::Off)
    }

    /// Session settings for the TDS client.
    pub fn tds_config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.application_name("mass_portfolio_gains");
        config.authentication(AuthMethod::sql_server(&self.username, &self.password));
        config.encryption(self.encryption());
        if self.skips_certificate_validation() {
            config.trust_cert();
        }
        config
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self
            .connection_string()
            .replace(&format!("PWD={};", self.password), "PWD=***;");
        write!(f, "{}", s)
    }
}

/// Split `DB_SERVER` into host and port.  Accepts `host`, `host,port` and an
/// optional `tcp:` prefix.
pub fn parse_server(server: &str) -> Result<(String, u16), ExtractError> {
    let s = server.trim();
    let s = s.strip_prefix("tcp:").unwrap_or(s);
    let (host, port) = match s.split_once(',') {
        Some((host, port)) => {
            let port = port.trim().parse::<u16>().map_err(|_| {
                ExtractError::Connection(format!("Invalid port in DB_SERVER: {}", server))
            })?;
            (host.trim(), port)
        }
        None => (s, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(ExtractError::Connection(format!(
            "Invalid DB_SERVER: {}",
            server
        )));
    }
    Ok((host.to_string(), port))
}

/// Open the one session of this run.  The caller owns the client and must
/// close it.
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<MssqlClient, ExtractError> {
    info!("connecting with {}", descriptor);
    let config = descriptor.tds_config();

    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| ExtractError::Connection(e.to_string()))?;
    tcp.set_nodelay(true)
        .map_err(|e| ExtractError::Connection(e.to_string()))?;

    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| ExtractError::Connection(e.to_string()))?;
    info!(
        "connected to {}:{}/{}",
        descriptor.host, descriptor.port, descriptor.database
    );
    Ok(client)
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::path::Path;

    use super::*;

    fn credentials(server: &str) -> Credentials {
        Credentials {
            server: server.to_string(),
            database: "Skywalker".to_string(),
            username: "dash".to_string(),
            password: "s3cret".to_string(),
        }
    }

    #[test]
    fn server_forms() -> Result<(), Box<dyn Error>> {
        assert_eq!(parse_server("sql01")?, ("sql01".to_string(), 1433));
        assert_eq!(parse_server("sql01,14330")?, ("sql01".to_string(), 14330));
        assert_eq!(parse_server("tcp:sql01.corp.net, 1500")?, ("sql01.corp.net".to_string(), 1500));
        assert!(parse_server("sql01,abc").is_err());
        assert!(parse_server(",1433").is_err());
        Ok(())
    }

    #[test]
    fn driver_18_trusts_certificate() -> Result<(), Box<dyn Error>> {
        let d = ConnectionDescriptor::new(
            &credentials("sql01"),
            Driver::new("ODBC Driver 18 for SQL Server"),
        )?;
        assert!(d.trust_server_certificate);
        assert_eq!(
            d.connection_string(),
            "DRIVER={ODBC Driver 18 for SQL Server};SERVER=sql01,1433;DATABASE=Skywalker;UID=dash;PWD=s3cret;TrustServerCertificate=yes;"
        );
        Ok(())
    }

    #[test]
    fn older_drivers_omit_trust_option() -> Result<(), Box<dyn Error>> {
        for name in ["ODBC Driver 17 for SQL Server", "SQL Server"] {
            let d = ConnectionDescriptor::new(&credentials("sql01,1500"), Driver::new(name))?;
            assert!(!d.trust_server_certificate);
            assert!(!d.connection_string().contains("TrustServerCertificate"));
            assert!(d.connection_string().contains("SERVER=sql01,1500;"));
        }
        Ok(())
    }

    #[test]
    fn certificate_validation_per_driver() -> Result<(), Box<dyn Error>> {
        let d18 = ConnectionDescriptor::new(
            &credentials("sql01"),
            Driver::new("ODBC Driver 18 for SQL Server"),
        )?;
        assert!(matches!(d18.encryption(), EncryptionLevel::Required));
        assert!(d18.skips_certificate_validation());

        for name in ["ODBC Driver 17 for SQL Server", "SQL Server"] {
            let d = ConnectionDescriptor::new(&credentials("sql01"), Driver::new(name))?;
            assert!(matches!(d.encryption(), EncryptionLevel::Off));
            assert!(!d.trust_server_certificate);
            assert!(d.skips_certificate_validation());
        }
        Ok(())
    }

    #[test]
    fn display_masks_password() -> Result<(), Box<dyn Error>> {
        let d = ConnectionDescriptor::new(
            &credentials("sql01"),
            Driver::new("ODBC Driver 17 for SQL Server"),
        )?;
        let shown = d.to_string();
        assert!(shown.contains("PWD=***;"));
        assert!(!shown.contains("s3cret"));
        Ok(())
    }

    #[test]
    fn tds_config_address() -> Result<(), Box<dyn Error>> {
        let d = ConnectionDescriptor::new(
            &credentials("sql01,1500"),
            Driver::new("ODBC Driver 18 for SQL Server"),
        )?;
        assert_eq!(d.tds_config().get_addr(), "sql01:1500");
        Ok(())
    }

    #[ignore]
    #[tokio::test]
    async fn connect_test() -> Result<(), Box<dyn Error>> {
        dotenvy::from_path(Path::new(".env/test.env"))?;
        let credentials = Credentials::from_env()?;
        let driver = Driver::new("ODBC Driver 18 for SQL Server");
        let descriptor = ConnectionDescriptor::new(&credentials, driver)?;
        let client = connect(&descriptor).await?;
        client.close().await?;
        Ok(())
    }
}
