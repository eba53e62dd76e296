use modemcom::domain::config::DialTiming;
use modemcom::{ModemConfig, ModemServer, PhonebookEntry, SilentAudio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// End to end tests against a running emulator
#[cfg(test)]
mod integration_tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let route = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if socket.write_all(&buf[..n]).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });

        route
    }

    async fn modem(phonebook: Vec<PhonebookEntry>) -> ModemServer {
        let mut config = ModemConfig::default();
        config.modem.port = 0;
        config.modem.connect_timeout_ms = 2000;
        config.dial = DialTiming::immediate();
        config.phonebook = phonebook;

        let mut server = ModemServer::bind(config, Arc::new(SilentAudio)).await.unwrap();
        server.start().unwrap();
        server
    }

    async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
        let mut output = Vec::new();
        let mut buf = [0u8; 1024];

        timeout(WAIT, async {
            while !String::from_utf8_lossy(&output).contains(needle) {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "modem closed: {:?}", String::from_utf8_lossy(&output));
                output.extend_from_slice(&buf[..n]);
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "timed out waiting for {:?}, got {:?}",
                needle,
                String::from_utf8_lossy(&output)
            )
        });

        String::from_utf8_lossy(&output).into_owned()
    }

    async fn connect(server: &ModemServer) -> TcpStream {
        let mut client = TcpStream::connect(server.bind_addr()).await.unwrap();
        read_until(&mut client, "Ready\r\n").await;
        client
    }

    #[tokio::test]
    async fn test_identification_and_unknown_commands() {
        let mut server = modem(vec![]).await;
        let mut client = connect(&server).await;

        client.write_all(b"ati\r").await.unwrap();
        let output = read_until(&mut client, "OK\r\n").await;
        assert_eq!(output, "ati\r\nModemCom Hayes Emulator v1.0\r\nOK\r\n");

        client.write_all(b"AT&K3\r").await.unwrap();
        read_until(&mut client, "AT&K3\r\nOK\r\n").await;

        client.write_all(b"DIR\r").await.unwrap();
        read_until(&mut client, "DIR\r\nERROR\r\n").await;

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_echo_host_and_hang_up() {
        let route = echo_server().await;
        let mut server = modem(vec![PhonebookEntry::new("555-1234").with_route(route)]).await;
        let mut client = connect(&server).await;

        client.write_all(b"ATDT555-1234\r").await.unwrap();
        let output = read_until(&mut client, "CONNECT 57600\r\n").await;
        assert_eq!(output, "ATDT555-1234\r\nOK\r\nCONNECT 57600\r\n");

        client.write_all(b"ping over the wire").await.unwrap();
        read_until(&mut client, "ping over the wire").await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        client.write_all(b"+++").await.unwrap();
        read_until(&mut client, "OK\r\n").await;

        client.write_all(b"ATH0\r").await.unwrap();
        read_until(&mut client, "ATH0\r\nOK\r\n").await;

        // Command mode again: text is interpreted, not relayed
        client.write_all(b"ping\r").await.unwrap();
        read_until(&mut client, "ping\r\nERROR\r\n").await;

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_redial_replaces_connection() {
        let route = echo_server().await;
        let mut server = modem(vec![PhonebookEntry::new("1").with_route(route)]).await;
        let mut client = connect(&server).await;

        for _ in 0..2 {
            client.write_all(b"ATD1\r").await.unwrap();
            read_until(&mut client, "CONNECT 57600\r\n").await;

            client.write_all(b"hello").await.unwrap();
            read_until(&mut client, "hello").await;

            tokio::time::sleep(Duration::from_millis(50)).await;
            client.write_all(b"+++").await.unwrap();
            read_until(&mut client, "OK\r\n").await;
        }

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_busy_and_no_carrier() {
        let unused = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let mut server = modem(vec![
            PhonebookEntry::new("555-0000"),
            PhonebookEntry::new("555-9999").with_route(unused),
        ])
        .await;
        let mut client = connect(&server).await;

        client.write_all(b"ATE0\r").await.unwrap();
        read_until(&mut client, "OK\r\n").await;

        client.write_all(b"ATD5550000\r").await.unwrap();
        assert_eq!(read_until(&mut client, "BUSY\r\n").await, "OK\r\nBUSY\r\n");

        client.write_all(b"ATD5559999\r").await.unwrap();
        assert_eq!(
            read_until(&mut client, "NO CARRIER\r\n").await,
            "OK\r\nNO CARRIER\r\n"
        );

        client.write_all(b"ATD123\r").await.unwrap();
        assert_eq!(
            read_until(&mut client, "NO CARRIER\r\n").await,
            "OK\r\nNO CARRIER\r\n"
        );

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_hangup_reports_no_carrier() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let route = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            socket.write_all(b"bye").await.unwrap();
        });

        let mut server = modem(vec![PhonebookEntry::new("42").with_route(route)]).await;
        let mut client = connect(&server).await;

        client.write_all(b"ATD42\r").await.unwrap();
        let output = read_until(&mut client, "NO CARRIER\r\n").await;
        assert!(
            output.ends_with("CONNECT 57600\r\nbyeNO CARRIER\r\n"),
            "{:?}",
            output
        );

        client.write_all(b"AT\r").await.unwrap();
        read_until(&mut client, "AT\r\nOK\r\n").await;

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_one_session_at_a_time() {
        let mut server = modem(vec![]).await;
        let first = connect(&server).await;

        let mut second = TcpStream::connect(server.bind_addr()).await.unwrap();
        let mut rejected = String::new();
        timeout(WAIT, second.read_to_string(&mut rejected))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejected, "BUSY - Another session is active\r\n");

        drop(first);
        timeout(WAIT, async {
            while server.stats().session_active {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let _third = connect(&server).await;
        let stats = server.stats();
        assert_eq!(stats.sessions_accepted, 2);
        assert_eq!(stats.sessions_rejected, 1);

        server.stop().await.unwrap();
    }
}
