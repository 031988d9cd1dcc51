use crate::client::AdbClient;
use crate::link::{LinkError, LinkResult};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

const SOCKET_PREFIX: &str = "@snapo_server_";

/// Identifies one forwarded Snap-O Link socket: which device it's on, the
/// abstract socket name discovered on that device, and the local TCP port
/// the forward was installed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkServerDescriptor {
    pub serial: String,
    pub socket_name: String,
    pub local_port: u16,
}

/// List the Snap-O Link abstract UNIX sockets currently open on a device by
/// scanning `/proc/net/unix` for `@snapo_server_*` entries.
pub async fn discover_servers(client: &AdbClient, serial: &str) -> LinkResult<Vec<String>> {
    let output = client
        .shell(Some(serial), "cat /proc/net/unix")
        .await?;
    Ok(parse_snapo_sockets(&output))
}

/// `/proc/net/unix` lines are whitespace-separated; the abstract socket
/// name, when present, is the last field and is prefixed with `@` rather
/// than a filesystem path.
fn parse_snapo_sockets(data: &str) -> Vec<String> {
    data.lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|field| field.starts_with(SOCKET_PREFIX))
        .map(|field| field.trim_start_matches('@').to_string())
        .collect()
}

/// An established connection to a Snap-O Link server: the underlying TCP
/// stream plus enough information to tear the forward down again.
pub struct LinkConnection {
    pub descriptor: LinkServerDescriptor,
    pub stream: TcpStream,
    pub(crate) client: Arc<AdbClient>,
}

impl LinkConnection {
    /// Reserve a local ephemeral port, install a `host-serial:…:forward:…`
    /// pointing it at the device's abstract socket, and connect to it.
    ///
    /// The listener used to reserve the port is dropped before forwarding,
    /// accepting the small window where another process could steal it —
    /// an acceptable tradeoff for a development tool talking to a single
    /// local ADB server.
    pub async fn connect(client: Arc<AdbClient>, serial: &str, socket_name: &str) -> LinkResult<Self> {
        let local_port = reserve_ephemeral_port().await?;
        let remote = format!("localabstract:{}", socket_name);

        client.forward(serial, local_port, &remote).await?;
        debug!(
            "forwarded 127.0.0.1:{} -> {} on {}",
            local_port, remote, serial
        );

        let stream = match TcpStream::connect(("127.0.0.1", local_port)).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = client.killforward(serial, local_port).await;
                return Err(LinkError::Io(e));
            }
        };
        stream.set_nodelay(true).ok();

        Ok(Self {
            descriptor: LinkServerDescriptor {
                serial: serial.to_string(),
                socket_name: socket_name.to_string(),
                local_port,
            },
            stream,
            client,
        })
    }

    /// Remove the forward. Idempotent-ish: a failure here (e.g. the device
    /// already disconnected) is logged, not propagated, since the forward
    /// has no observable effect once nothing is listening on the device
    /// side of it.
    pub async fn close(self) {
        if let Err(e) = self
            .client
            .killforward(&self.descriptor.serial, self.descriptor.local_port)
            .await
        {
            warn!(
                "failed to remove forward for {}: {}",
                self.descriptor.serial, e
            );
        }
    }
}

async fn reserve_ephemeral_port() -> LinkResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapo_sockets() {
        let data = "\
Num       RefCount Protocol Flags    Type St Inode Path
0000000000000000: 00000002 00000000 00010000 0001 01 12345 @snapo_server_1
0000000000000000: 00000002 00000000 00010000 0001 01 12346 /dev/socket/zygote
0000000000000000: 00000002 00000000 00010000 0001 01 12347 @snapo_server_2
";
        let sockets = parse_snapo_sockets(data);
        assert_eq!(sockets, vec!["snapo_server_1", "snapo_server_2"]);
    }

    #[test]
    fn test_parse_snapo_sockets_none_found() {
        let data = "0000000000000000: 00000002 00000000 00010000 0001 01 12345\n";
        assert!(parse_snapo_sockets(data).is_empty());
    }

    #[tokio::test]
    async fn test_reserve_ephemeral_port_returns_free_port() {
        let port = reserve_ephemeral_port().await.unwrap();
        assert!(port > 0);
        // The port should be free again immediately after reservation.
        assert!(TcpListener::bind(("127.0.0.1", port)).await.is_ok());
    }
}
