//! Loopback stand-in for an OS-1: a TCP command server and a UDP data sender

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use contracts::{ImuSample, Parameters, RawColumn, IDENTITY_MATRIX};
use ingestion::codec::{encode_imu, encode_lidar_datagram, COLUMNS_PER_PACKET};
use ingestion::MockSensor;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Default)]
struct Recorded {
    handshakes: AtomicU64,
    commands: Mutex<Vec<String>>,
}

/// Answers the command protocol on an ephemeral loopback port
pub struct FakeOs1 {
    tcp_port: u16,
    recorded: Arc<Recorded>,
    task: JoinHandle<()>,
}

impl FakeOs1 {
    pub async fn start(beams: usize) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let tcp_port = listener.local_addr()?.port();
        let recorded = Arc::new(Recorded::default());

        let state = Arc::clone(&recorded);
        let task = tokio::spawn(async move {
            while let Ok((stream, peer)) = listener.accept().await {
                debug!(%peer, "fake sensor accepted");
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, beams, &state).await {
                        debug!(error = %e, "fake sensor connection ended");
                    }
                });
            }
        });

        Ok(Self {
            tcp_port,
            recorded,
            task,
        })
    }

    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    /// Completed `reinitialize` commands
    pub fn handshakes(&self) -> u64 {
        self.recorded.handshakes.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.recorded
            .commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Parameters pointing a driver at this sensor
    pub fn parameters(&self, lidar_port: u16, imu_port: u16) -> Parameters {
        let mut params = Parameters::with_addresses("127.0.0.1", "127.0.0.1");
        params.tcp_port = self.tcp_port;
        params.lidar_port = lidar_port;
        params.imu_port = imu_port;
        params.handshake_timeout_ms = 2_000;
        params
    }
}

impl Drop for FakeOs1 {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, beams: usize, recorded: &Recorded) -> io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        let reply = reply(&command, beams, recorded);
        if let Ok(mut commands) = recorded.commands.lock() {
            commands.push(command);
        }
        reader
            .get_mut()
            .write_all(format!("{reply}\n").as_bytes())
            .await?;
    }
}

fn reply(command: &str, beams: usize, recorded: &Recorded) -> String {
    match command.split_whitespace().next().unwrap_or_default() {
        "set_config_param" => "set_config_param".to_string(),
        "reinitialize" => {
            recorded.handshakes.fetch_add(1, Ordering::SeqCst);
            "reinitialize".to_string()
        }
        "get_sensor_info" => serde_json::json!({
            "prod_line": "OS-1-64",
            "prod_sn": format!("fake-{:06}", recorded.handshakes.load(Ordering::SeqCst)),
            "build_rev": "v1.13.0",
            "status": "RUNNING",
        })
        .to_string(),
        "get_beam_intrinsics" => {
            let step = if beams > 1 { 33.2 / (beams - 1) as f64 } else { 0.0 };
            let altitudes: Vec<f64> = (0..beams).map(|b| 16.6 - step * b as f64).collect();
            serde_json::json!({
                "beam_altitude_angles": altitudes,
                "beam_azimuth_angles": vec![0.0; beams],
            })
            .to_string()
        }
        "get_imu_intrinsics" => {
            serde_json::json!({ "imu_to_sensor_transform": IDENTITY_MATRIX }).to_string()
        }
        "get_lidar_intrinsics" => {
            serde_json::json!({ "lidar_to_sensor_transform": IDENTITY_MATRIX }).to_string()
        }
        _ => "error: unknown command".to_string(),
    }
}

/// Sends data the way the sensor streams it to the computer address
pub struct DataSender {
    socket: UdpSocket,
    lidar: SocketAddr,
    imu: SocketAddr,
}

impl DataSender {
    pub fn new(lidar_port: u16, imu_port: u16) -> io::Result<Self> {
        Ok(Self {
            socket: UdpSocket::bind("127.0.0.1:0")?,
            lidar: SocketAddr::from(([127, 0, 0, 1], lidar_port)),
            imu: SocketAddr::from(([127, 0, 0, 1], imu_port)),
        })
    }

    /// One datagram per 16 columns
    pub fn send_columns(&self, columns: &[RawColumn]) -> io::Result<()> {
        for chunk in columns.chunks(COLUMNS_PER_PACKET) {
            self.socket.send_to(&encode_lidar_datagram(chunk), self.lidar)?;
        }
        Ok(())
    }

    pub fn send_imu(&self, sample: &ImuSample) -> io::Result<()> {
        self.socket.send_to(&encode_imu(sample), self.imu)?;
        Ok(())
    }

    pub fn send_raw_lidar(&self, bytes: &[u8]) -> io::Result<()> {
        self.socket.send_to(bytes, self.lidar)?;
        Ok(())
    }
}

/// Columns `0..width` of one revolution at a flat range, 10 Hz spacing
pub fn revolution(width: usize, beams: usize, range_mm: u32, start_ns: u64) -> Vec<RawColumn> {
    let period_ns = 100_000_000 / width as u64;
    (0..width)
        .map(|m| MockSensor::column(m as u16, start_ns + m as u64 * period_ns, beams, range_mm))
        .collect()
}

/// Two distinct free UDP ports on loopback
pub fn free_udp_ports() -> io::Result<(u16, u16)> {
    let a = UdpSocket::bind("127.0.0.1:0")?;
    let b = UdpSocket::bind("127.0.0.1:0")?;
    Ok((a.local_addr()?.port(), b.local_addr()?.port()))
}
