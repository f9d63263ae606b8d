//! OS-1 packet source
//!
//! Two non-blocking UDP sockets bound to the computer address plus the TCP
//! handshake. A lidar datagram carries several column blocks; they are decoded
//! together and handed out one per poll.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::Arc;

use contracts::{
    BoxFuture, Configuration, ContractError, ImuSample, Metadata, RawColumn, SensorInterface,
    SourceStats,
};
use tracing::{debug, info, instrument, warn};

use crate::codec::{decode_imu, decode_lidar_datagram};
use crate::handshake::handshake;
use crate::metrics::IngestionMetrics;

/// Largest UDP payload
const MAX_DATAGRAM: usize = 65_536;

struct DataSockets {
    lidar: UdpSocket,
    imu: UdpSocket,
    computer_ip: String,
    lidar_port: u16,
    imu_port: u16,
}

impl DataSockets {
    fn bind(config: &Configuration) -> Result<Self, ContractError> {
        let open = |port: u16| {
            let socket = UdpSocket::bind((config.computer_ip.as_str(), port)).map_err(|e| {
                ContractError::sensor_connection(
                    format!("{}:{}", config.computer_ip, port),
                    format!("bind failed: {e}"),
                )
            })?;
            socket.set_nonblocking(true)?;
            Ok::<_, ContractError>(socket)
        };

        Ok(Self {
            lidar: open(config.lidar_port)?,
            imu: open(config.imu_port)?,
            computer_ip: config.computer_ip.clone(),
            lidar_port: config.lidar_port,
            imu_port: config.imu_port,
        })
    }

    fn matches(&self, config: &Configuration) -> bool {
        self.computer_ip == config.computer_ip
            && self.lidar_port == config.lidar_port
            && self.imu_port == config.imu_port
    }
}

/// Ouster OS-1 sensor
pub struct Os1Sensor {
    name: String,
    sockets: Option<DataSockets>,
    beams: usize,
    queue: VecDeque<RawColumn>,
    buf: Vec<u8>,
    metrics: Arc<IngestionMetrics>,
}

impl Os1Sensor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sockets: None,
            beams: 0,
            queue: VecDeque::new(),
            buf: vec![0; MAX_DATAGRAM],
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Shared counters
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    #[instrument(name = "os1_connect", skip(self, config), fields(sensor = %self.name))]
    async fn connect_inner(&mut self, config: &Configuration) -> Result<Metadata, ContractError> {
        self.close();

        // Bound before the handshake so no data is lost once the sensor restarts streaming
        let sockets = DataSockets::bind(config)?;
        let metadata = handshake(config).await?;

        info!(
            sensor = %self.name,
            lidar_ip = %config.lidar_ip,
            computer_ip = %config.computer_ip,
            beams = metadata.beams(),
            mode = %metadata.lidar_mode,
            "sensor connected"
        );
        self.beams = metadata.beams();
        self.sockets = Some(sockets);
        Ok(metadata)
    }

    #[instrument(name = "os1_reset", skip(self, config), fields(sensor = %self.name))]
    async fn reset_inner(&mut self, config: &Configuration) -> Result<Metadata, ContractError> {
        let rebind = match &self.sockets {
            Some(current) => !current.matches(config),
            None => true,
        };
        let fresh = if rebind {
            if let Some(current) = &self.sockets {
                debug!(
                    sensor = %self.name,
                    old_lidar_port = current.lidar_port,
                    new_lidar_port = config.lidar_port,
                    "rebinding data sockets"
                );
            }
            Some(DataSockets::bind(config)?)
        } else {
            None
        };

        let metadata = handshake(config).await?;

        if let Some(sockets) = fresh {
            self.sockets = Some(sockets);
        }
        self.beams = metadata.beams();
        self.queue.clear();
        info!(sensor = %self.name, mode = %metadata.lidar_mode, "sensor reset");
        Ok(metadata)
    }
}

impl SensorInterface for Os1Sensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect<'a>(
        &'a mut self,
        config: &'a Configuration,
    ) -> BoxFuture<'a, Result<Metadata, ContractError>> {
        Box::pin(self.connect_inner(config))
    }

    fn reset<'a>(
        &'a mut self,
        config: &'a Configuration,
    ) -> BoxFuture<'a, Result<Metadata, ContractError>> {
        Box::pin(self.reset_inner(config))
    }

    fn poll_lidar(&mut self) -> Option<RawColumn> {
        if let Some(column) = self.queue.pop_front() {
            return Some(column);
        }
        let sockets = self.sockets.as_ref()?;

        match sockets.lidar.recv_from(&mut self.buf) {
            Ok((len, _)) => {
                self.metrics.record_datagram();
                let before = self.queue.len();
                match decode_lidar_datagram(&self.buf[..len], self.beams, &mut self.queue) {
                    Ok(invalid) => {
                        self.metrics
                            .record_columns(self.queue.len() - before, invalid);
                    }
                    Err(e) => {
                        self.metrics.record_datagram_dropped();
                        debug!(sensor = %self.name, error = %e, "lidar datagram dropped");
                    }
                }
                self.queue.pop_front()
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!(sensor = %self.name, error = %e, "lidar socket error");
                None
            }
        }
    }

    fn poll_imu(&mut self) -> Option<ImuSample> {
        let sockets = self.sockets.as_ref()?;
        match sockets.imu.recv_from(&mut self.buf) {
            Ok((len, _)) => {
                self.metrics.record_imu();
                match decode_imu(&self.buf[..len]) {
                    Ok(sample) => Some(sample),
                    Err(e) => {
                        self.metrics.record_imu_dropped();
                        debug!(sensor = %self.name, error = %e, "imu datagram dropped");
                        None
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!(sensor = %self.name, error = %e, "imu socket error");
                None
            }
        }
    }

    fn close(&mut self) {
        if self.sockets.take().is_some() {
            debug!(sensor = %self.name, "data sockets closed");
        }
        self.queue.clear();
    }

    fn is_connected(&self) -> bool {
        self.sockets.is_some()
    }

    fn stats(&self) -> SourceStats {
        self.metrics.snapshot()
    }
}
