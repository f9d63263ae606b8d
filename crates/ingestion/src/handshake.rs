//! OS-1 TCP command handshake
//!
//! Newline-terminated text commands on the sensor's command port. Each
//! `set_config_param` and `reinitialize` is acknowledged by echoing the command
//! name; each `get_*` query is answered with one JSON line.

use contracts::{
    BeamIntrinsics, Configuration, ContractError, ImuIntrinsics, LidarIntrinsics, Metadata,
    SensorInfo,
};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Command client over any byte stream
pub struct HandshakeClient<S> {
    stream: BufReader<S>,
    host: String,
    line: String,
}

impl<S> HandshakeClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, host: impl Into<String>) -> Self {
        Self {
            stream: BufReader::new(stream),
            host: host.into(),
            line: String::new(),
        }
    }

    /// Push the configuration, reinitialize, then read back the calibration
    pub async fn run(mut self, config: &Configuration) -> Result<Metadata, ContractError> {
        self.set_param("udp_ip", &config.computer_ip).await?;
        self.set_param("udp_port_lidar", &config.lidar_port.to_string())
            .await?;
        self.set_param("udp_port_imu", &config.imu_port.to_string())
            .await?;
        self.set_param("lidar_mode", config.lidar_mode.as_str())
            .await?;
        self.expect_ack("reinitialize", "reinitialize").await?;

        let sensor_info: SensorInfo = self.query("get_sensor_info").await?;
        let beam_intrinsics: BeamIntrinsics = self.query("get_beam_intrinsics").await?;
        let imu: ImuIntrinsics = self.query("get_imu_intrinsics").await?;
        let lidar: LidarIntrinsics = self.query("get_lidar_intrinsics").await?;

        let metadata = Metadata {
            hostname: self.host.clone(),
            sensor_info,
            lidar_mode: config.lidar_mode,
            lidar_port: config.lidar_port,
            imu_port: config.imu_port,
            beam_intrinsics,
            imu_to_sensor_transform: imu.imu_to_sensor_transform,
            lidar_to_sensor_transform: lidar.lidar_to_sensor_transform,
        };
        metadata
            .validate()
            .map_err(|e| ContractError::handshake("get_beam_intrinsics", e.to_string()))?;
        Ok(metadata)
    }

    async fn set_param(&mut self, key: &str, value: &str) -> Result<(), ContractError> {
        self.expect_ack(&format!("set_config_param {key} {value}"), "set_config_param")
            .await
    }

    async fn expect_ack(&mut self, command: &str, ack: &str) -> Result<(), ContractError> {
        let reply = self.request(command).await?;
        if reply != ack {
            return Err(ContractError::handshake(
                command,
                format!("expected '{ack}', sensor replied '{reply}'"),
            ));
        }
        Ok(())
    }

    async fn query<T: DeserializeOwned>(&mut self, command: &str) -> Result<T, ContractError> {
        let reply = self.request(command).await?;
        serde_json::from_str(&reply).map_err(|e| {
            ContractError::handshake(command, format!("unparsable reply: {e}"))
        })
    }

    async fn request(&mut self, command: &str) -> Result<String, ContractError> {
        debug!(host = %self.host, command, "sensor command");
        let io_err = |e: std::io::Error| ContractError::handshake(command, e.to_string());

        let stream = self.stream.get_mut();
        stream
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(io_err)?;
        stream.flush().await.map_err(io_err)?;

        self.line.clear();
        let n = self.stream.read_line(&mut self.line).await.map_err(io_err)?;
        if n == 0 {
            return Err(ContractError::handshake(command, "connection closed by sensor"));
        }
        Ok(self.line.trim_end().to_string())
    }
}

/// Connect to the command port and run the handshake within the configured timeout
#[instrument(
    name = "sensor_handshake",
    skip(config),
    fields(lidar_ip = %config.lidar_ip, mode = %config.lidar_mode)
)]
pub async fn handshake(config: &Configuration) -> Result<Metadata, ContractError> {
    let exchange = async {
        let stream = TcpStream::connect((config.lidar_ip.as_str(), config.tcp_port))
            .await
            .map_err(|e| {
                ContractError::sensor_connection(
                    format!("{}:{}", config.lidar_ip, config.tcp_port),
                    e.to_string(),
                )
            })?;
        HandshakeClient::new(stream, config.lidar_ip.clone())
            .run(config)
            .await
    };

    tokio::time::timeout(config.handshake_timeout, exchange)
        .await
        .map_err(|_| {
            ContractError::handshake(
                "connect",
                format!("no answer within {:?}", config.handshake_timeout),
            )
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LidarMode, Parameters, IDENTITY_MATRIX};
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream};

    fn config() -> Configuration {
        let mut params = Parameters::with_addresses("127.0.0.1", "127.0.0.1");
        params.handshake_timeout_ms = 500;
        params.to_configuration().unwrap()
    }

    /// Answer commands like a sensor; `bad_ack` replaces the reinitialize ack
    async fn fake_sensor(stream: DuplexStream, bad_ack: Option<&'static str>) -> Vec<String> {
        let mut reader = BufReader::new(stream);
        let mut seen = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let cmd = line.trim_end().to_string();
            let reply = match cmd.split_whitespace().next().unwrap() {
                "set_config_param" => "set_config_param".to_string(),
                "reinitialize" => bad_ack.unwrap_or("reinitialize").to_string(),
                "get_sensor_info" => r#"{"prod_line":"OS-1-64","prod_sn":"991900123456","build_rev":"v1.13.0","status":"RUNNING"}"#.to_string(),
                "get_beam_intrinsics" => serde_json::json!({
                    "beam_altitude_angles": [2.0, 0.0, -2.0],
                    "beam_azimuth_angles": [3.0, -1.0, 3.0]
                })
                .to_string(),
                "get_imu_intrinsics" => serde_json::json!({ "imu_to_sensor_transform": IDENTITY_MATRIX }).to_string(),
                "get_lidar_intrinsics" => serde_json::json!({ "lidar_to_sensor_transform": IDENTITY_MATRIX }).to_string(),
                _ => "error: unknown command".to_string(),
            };
            seen.push(cmd);
            reader
                .get_mut()
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .unwrap();
        }
        seen
    }

    #[tokio::test]
    async fn test_handshake_sequence() {
        let (client, server) = duplex(4096);
        let sensor = tokio::spawn(fake_sensor(server, None));

        let metadata = HandshakeClient::new(client, "127.0.0.1")
            .run(&config())
            .await
            .unwrap();
        assert_eq!(metadata.beams(), 3);
        assert_eq!(metadata.sensor_info.prod_sn, "991900123456");
        assert_eq!(metadata.lidar_mode, LidarMode::Mode512x10);

        let seen = sensor.await.unwrap();
        assert_eq!(
            seen,
            vec![
                "set_config_param udp_ip 127.0.0.1",
                "set_config_param udp_port_lidar 7502",
                "set_config_param udp_port_imu 7503",
                "set_config_param lidar_mode 512x10",
                "reinitialize",
                "get_sensor_info",
                "get_beam_intrinsics",
                "get_imu_intrinsics",
                "get_lidar_intrinsics",
            ]
        );
    }

    #[tokio::test]
    async fn test_unexpected_ack() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_sensor(server, Some("error")));

        let err = HandshakeClient::new(client, "127.0.0.1")
            .run(&config())
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(err.to_string().contains("reinitialize"));
    }

    #[tokio::test]
    async fn test_sensor_hangs_up() {
        let (client, server) = duplex(4096);
        drop(server);
        let err = HandshakeClient::new(client, "127.0.0.1")
            .run(&config())
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = config();
        config.tcp_port = port;
        config.handshake_timeout = Duration::from_secs(2);
        let err = handshake(&config).await.unwrap_err();
        assert!(err.is_connection());
        assert!(!err.is_fatal());
    }
}
