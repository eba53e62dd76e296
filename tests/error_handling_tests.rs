use modemcom::{ModemConfig, ModemError, ModemResult, PhonebookEntry, PhonebookResolver};
use std::error::Error;

/// Error handling and resilience tests
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let errors = vec![
            ModemError::Config {
                message: "Config error".to_string(),
            },
            ModemError::Session {
                message: "Session error".to_string(),
            },
            ModemError::InvalidRoute("nowhere".to_string()),
            ModemError::Output("Output error".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
            assert!(error.source().is_none());
        }

        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModemError>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error: ModemError = io_error.into();

        assert!(matches!(error, ModemError::Network(_)));
        assert!(error.source().is_some());
        assert!(error.to_string().contains("refused"));
    }

    #[test]
    fn test_result_propagation() {
        fn load(valid: bool) -> ModemResult<u16> {
            if valid {
                Ok(5000)
            } else {
                Err(ModemError::Config {
                    message: "Test error".to_string(),
                })
            }
        }

        fn wrapper(valid: bool) -> ModemResult<u16> {
            let port = load(valid)?;
            Ok(port + 1)
        }

        assert_eq!(wrapper(true).unwrap(), 5001);
        let error = wrapper(false).unwrap_err();
        assert_eq!(error.to_string(), "Configuration error: Test error");
    }

    #[test]
    fn test_empty_number_rejected() {
        let mut config = ModemConfig::default();
        config.phonebook.push(PhonebookEntry::new("  "));

        assert!(matches!(config.validate(), Err(ModemError::Config { .. })));
    }

    #[test]
    fn test_bad_routes_are_warnings() {
        let mut config = ModemConfig::default();
        config.phonebook = vec![
            PhonebookEntry::new("1").with_route("host-without-port"),
            PhonebookEntry::new("2").with_route("host:99999"),
            PhonebookEntry::new("3").with_route("localhost:23"),
        ];

        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("'1'"));
        assert!(warnings[1].contains("'2'"));
    }

    #[test]
    fn test_malformed_toml_fails_to_parse() {
        let result: Result<ModemConfig, _> = toml::from_str("[[phonebook]]\nroute_to = \"a:1\"\n");
        assert!(result.is_err(), "an entry needs a number");
    }

    #[test]
    fn test_resolver_handles_odd_input() {
        let resolver = PhonebookResolver::new(vec![PhonebookEntry::new("555-1234")]);

        for number in ["", " ", "-", "🙂", "+15551234"] {
            assert!(resolver.resolve(number).is_none(), "{:?}", number);
        }
        // Trailing separators normalize away
        assert!(resolver.resolve("555-1234-").is_some());
    }
}
