//! Connection-string construction for the PostgreSQL provider.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use secrecy::{ExposeSecret, SecretString};

use crate::model::ConnectionTarget;

/// Characters that must additionally be escaped beyond `NON_ALPHANUMERIC` so
/// that credential material can never be misparsed as DSN structure.
const DSN_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Builds a `postgresql://<user>:<password>@<host>:<port>/<db>?sslmode=<mode>`
/// connection string for `name`/`password` against `connection`,
/// percent-encoding both credential components.
#[must_use]
pub fn build_dsn(connection: &ConnectionTarget, name: &str, password: &SecretString) -> String {
    let encoded_name = utf8_percent_encode(name, DSN_COMPONENT);
    let encoded_password = utf8_percent_encode(password.expose_secret(), DSN_COMPONENT);
    format!(
        "postgresql://{encoded_name}:{encoded_password}@{host}:{port}/{database}?sslmode={ssl_mode}",
        host = connection.host,
        port = connection.port,
        database = connection.database,
        ssl_mode = connection.ssl_mode.as_dsn_value(),
    )
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::build_dsn;
    use crate::model::{ConnectionTarget, SslMode};

    #[test]
    fn dsn_embeds_sslmode_and_percent_encodes_password() {
        let connection = ConnectionTarget {
            host: "db.internal".to_owned(),
            port: 5432,
            database: "app".to_owned(),
            ssl_mode: SslMode::Require,
        };
        let password = SecretString::from("p@ss w/ord".to_owned());
        let dsn = build_dsn(&connection, "gk_abc123", &password);
        assert!(dsn.starts_with("postgresql://gk_abc123:"));
        assert!(dsn.contains("@db.internal:5432/app?sslmode=require"));
        assert!(!dsn.contains(' '));
        assert!(!dsn.contains('@') || dsn.matches('@').count() == 1);
    }

    #[test]
    fn dsn_defaults_sslmode_to_prefer() {
        let connection = ConnectionTarget {
            host: "localhost".to_owned(),
            port: 5432,
            database: "app".to_owned(),
            ssl_mode: SslMode::default(),
        };
        let password = SecretString::from("secret".to_owned());
        let dsn = build_dsn(&connection, "gk_readonly", &password);
        assert!(dsn.ends_with("sslmode=prefer"));
    }
}
