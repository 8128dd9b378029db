//! Receive loops that feed datagrams into a [`Device`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use iotdcp_transport::{DatagramSocket, MAX_DATAGRAM};

use crate::dispatch::DeviceLogic;
use crate::engine::Device;
use crate::error::Result;

/// How often the blocking loop checks its shutdown flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Counters reported when a loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub datagrams: u64,
    pub responses: u64,
    /// Responses the socket refused to send.
    pub send_failures: u64,
}

/// Serve `device` on `socket` until `shutdown` is set.
///
/// Receive errors end the loop; send errors are logged and counted.
pub fn serve<L: DeviceLogic>(
    device: &mut Device<L>,
    socket: &DatagramSocket,
    shutdown: &AtomicBool,
) -> Result<ServeStats> {
    socket.set_read_timeout(Some(POLL_INTERVAL))?;
    let local = socket.local_addr()?;
    tracing::info!(%local, "device serving");

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut stats = ServeStats::default();
    while !shutdown.load(Ordering::Relaxed) {
        let Some((len, endpoint)) = socket.recv_from(&mut buf)? else {
            continue;
        };
        stats.datagrams += 1;
        for response in device.handle_datagram(endpoint, &buf[..len]) {
            match socket.send_to(&response, endpoint) {
                Ok(_) => stats.responses += 1,
                Err(err) => record_send_failure(&mut stats, endpoint, &err),
            }
        }
    }

    tracing::info!(
        datagrams = stats.datagrams,
        responses = stats.responses,
        "device stopped"
    );
    Ok(stats)
}

/// Async variant of [`serve`]; stops when `shutdown` completes.
#[cfg(feature = "async")]
pub async fn serve_async<L, F>(
    device: &mut Device<L>,
    socket: &tokio::net::UdpSocket,
    shutdown: F,
) -> Result<ServeStats>
where
    L: DeviceLogic,
    F: std::future::Future<Output = ()>,
{
    let local = socket
        .local_addr()
        .map_err(iotdcp_transport::TransportError::from)?;
    tracing::info!(%local, "device serving");

    tokio::pin!(shutdown);
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut stats = ServeStats::default();
    loop {
        let (len, endpoint) = tokio::select! {
            _ = &mut shutdown => break,
            received = socket.recv_from(&mut buf) => {
                received.map_err(iotdcp_transport::TransportError::from)?
            }
        };
        stats.datagrams += 1;
        for response in device.handle_datagram(endpoint, &buf[..len]) {
            match socket.send_to(&response, endpoint).await {
                Ok(_) => stats.responses += 1,
                Err(err) => {
                    let err = iotdcp_transport::TransportError::from(err);
                    record_send_failure(&mut stats, endpoint, &err);
                }
            }
        }
    }

    tracing::info!(
        datagrams = stats.datagrams,
        responses = stats.responses,
        "device stopped"
    );
    Ok(stats)
}

fn record_send_failure(
    stats: &mut ServeStats,
    endpoint: SocketAddr,
    err: &iotdcp_transport::TransportError,
) {
    stats.send_failures += 1;
    tracing::warn!(%endpoint, error = %err, "response not sent");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use iotdcp_catalog::{Catalog, Interface, InterfaceType};
    use iotdcp_frame::{
        decode_response, encode_request, MessageType, Profile, RequestSpec, ResponseCode,
    };
    use uuid::Uuid;

    use super::*;
    use crate::config::DeviceSettings;
    use crate::dispatch::{Call, Reply, Responder};

    struct Inert;

    impl DeviceLogic for Inert {
        fn execute(&mut self, _call: &Call<'_>, reply: Responder<'_>) -> Reply {
            reply.ok()
        }

        fn get_property(&mut self, _call: &Call<'_>, reply: Responder<'_>) -> Reply {
            reply.ok()
        }

        fn set_property(&mut self, _call: &Call<'_>, reply: Responder<'_>) -> Reply {
            reply.ok()
        }
    }

    fn device() -> Device<Inert> {
        let catalog = Catalog {
            name: "Loop".to_string(),
            category_uuid: Uuid::from_u128(7),
            device_uuid: Uuid::from_u128(8),
            interfaces: vec![Interface::new("Relay", InterfaceType::OnOffSimple)],
        };
        Device::new(DeviceSettings::default(), catalog, Inert).unwrap()
    }

    #[test]
    fn serve_answers_until_shutdown() {
        let socket = DatagramSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&shutdown);
        let server = thread::spawn(move || {
            let mut device = device();
            serve(&mut device, &socket, &flag).unwrap()
        });

        let client = DatagramSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let spec = RequestSpec::system(Profile::Escaped, MessageType::QueryDevice, &[]);
        let wire = encode_request(Profile::Escaped, &spec).unwrap();
        client.send_to(&wire, addr).unwrap();

        let mut buf = [0u8; 512];
        let (len, from) = client.recv_from(&mut buf).unwrap().unwrap();
        assert_eq!(from, addr);
        let response = decode_response(Profile::Escaped, &buf[..len]).unwrap();
        assert_eq!(response.code, ResponseCode::Ok);

        // noise is dropped without a reply
        client.send_to(&[0x00, 0x01, 0x02], addr).unwrap();

        shutdown.store(true, Ordering::Relaxed);
        let stats = server.join().unwrap();
        assert!(stats.datagrams >= 1);
        assert_eq!(stats.responses, 1);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn serve_async_stops_on_shutdown() {
        let socket = DatagramSocket::bind("127.0.0.1:0")
            .unwrap()
            .into_tokio()
            .unwrap();
        let addr = socket.local_addr().unwrap();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let mut device = device();
            serve_async(&mut device, &socket, async {
                let _ = stopped.await;
            })
            .await
            .unwrap()
        });

        let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let spec = RequestSpec::system(Profile::Escaped, MessageType::QueryDevice, &[]);
        let wire = encode_request(Profile::Escaped, &spec).unwrap();
        client.send_to(&wire, addr).await.unwrap();
        let mut buf = [0u8; 512];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        let response = decode_response(Profile::Escaped, &buf[..len]).unwrap();
        assert_eq!(response.code, ResponseCode::Ok);

        stop.send(()).unwrap();
        let stats = server.await.unwrap();
        assert_eq!(stats.responses, 1);
    }
}
