//! Mock sensor
//!
//! Scripted or synthesized data for tests and the CLI `--simulate` mode, with
//! failure injection on connect/reset.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    BoxFuture, Configuration, ContractError, ImuSample, LidarMode, Metadata, PixelSample,
    RawColumn, SensorInterface, SourceStats, NANOS_PER_SEC,
};
use tracing::{debug, trace};

use crate::metrics::IngestionMetrics;

/// Mock sensor configuration
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Beams per column
    pub beams: usize,

    /// Synthesize endless revolutions once the scripted data is exhausted
    pub generate: bool,

    /// Generated columns per generated IMU sample
    pub imu_every: u64,

    /// Simulated handshake duration
    pub handshake_delay: Duration,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            beams: 16,
            generate: false,
            imu_every: 50,
            handshake_delay: Duration::ZERO,
        }
    }
}

/// Observation and failure injection handle, usable after the sensor is boxed
#[derive(Debug, Default)]
pub struct MockProbe {
    connect_calls: AtomicU64,
    reset_calls: AtomicU64,
    close_calls: AtomicU64,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_reset: AtomicBool,
}

impl MockProbe {
    pub fn connect_calls(&self) -> u64 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) -> u64 {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> u64 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reset(&self, fail: bool) {
        self.fail_reset.store(fail, Ordering::SeqCst);
    }
}

/// Synthetic revolution state
#[derive(Debug, Default)]
struct Generator {
    next_measurement: u16,
    next_timestamp_ns: u64,
    frame_id: u16,
    columns: u64,
    imu_pending: bool,
}

/// Mock sensor
pub struct MockSensor {
    name: String,
    config: MockSensorConfig,
    probe: Arc<MockProbe>,
    metrics: Arc<IngestionMetrics>,
    lidar: VecDeque<RawColumn>,
    imu: VecDeque<ImuSample>,
    lidar_mode: LidarMode,
    generator: Generator,
    handshakes: u64,
}

impl MockSensor {
    pub fn new(name: impl Into<String>, config: MockSensorConfig) -> Self {
        Self {
            name: name.into(),
            config,
            probe: Arc::new(MockProbe::default()),
            metrics: Arc::new(IngestionMetrics::new()),
            lidar: VecDeque::new(),
            imu: VecDeque::new(),
            lidar_mode: LidarMode::default(),
            generator: Generator::default(),
            handshakes: 0,
        }
    }

    /// Endless synthetic stream, as used by `--simulate`
    pub fn simulated(name: impl Into<String>, beams: usize) -> Self {
        Self::new(
            name,
            MockSensorConfig {
                beams,
                generate: true,
                ..Default::default()
            },
        )
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Queue a column for `poll_lidar`
    pub fn push_column(&mut self, column: RawColumn) {
        self.lidar.push_back(column);
    }

    pub fn push_columns(&mut self, columns: impl IntoIterator<Item = RawColumn>) {
        self.lidar.extend(columns);
    }

    /// Queue an IMU sample for `poll_imu`
    pub fn push_imu(&mut self, sample: ImuSample) {
        self.imu.push_back(sample);
    }

    /// One column with a flat scene: every beam at `range_mm`
    pub fn column(measurement_id: u16, timestamp_ns: u64, beams: usize, range_mm: u32) -> RawColumn {
        RawColumn {
            timestamp_ns,
            measurement_id,
            frame_id: 0,
            encoder_count: measurement_id as u32 * 176,
            pixels: (0..beams)
                .map(|beam| PixelSample {
                    range_mm,
                    reflectivity: 64,
                    signal: 100 + beam as u16,
                    noise: 20,
                })
                .collect(),
        }
    }

    /// Metadata of the next handshake; the serial number counts handshakes
    fn handshake_metadata(&mut self, config: &Configuration) -> Metadata {
        self.handshakes += 1;
        let mut metadata = Metadata::synthetic(
            config.lidar_ip.clone(),
            config.lidar_mode,
            self.config.beams,
            config.lidar_port,
            config.imu_port,
        );
        metadata.sensor_info.prod_sn = format!("mock-{:06}", self.handshakes);
        metadata
    }

    async fn connect_inner(&mut self, config: &Configuration) -> Result<Metadata, ContractError> {
        self.probe.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.handshake_delay.is_zero() {
            tokio::time::sleep(self.config.handshake_delay).await;
        }
        if self.probe.fail_connect.load(Ordering::SeqCst) {
            return Err(ContractError::sensor_connection(
                config.lidar_ip.clone(),
                "mock failure",
            ));
        }

        self.lidar_mode = config.lidar_mode;
        self.generator = Generator::default();
        self.probe.connected.store(true, Ordering::SeqCst);
        debug!(sensor = %self.name, mode = %config.lidar_mode, "mock sensor connected");
        Ok(self.handshake_metadata(config))
    }

    async fn reset_inner(&mut self, config: &Configuration) -> Result<Metadata, ContractError> {
        self.probe.reset_calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.handshake_delay.is_zero() {
            tokio::time::sleep(self.config.handshake_delay).await;
        }
        if self.probe.fail_reset.load(Ordering::SeqCst) {
            return Err(ContractError::handshake("reinitialize", "mock failure"));
        }

        self.lidar_mode = config.lidar_mode;
        self.generator = Generator::default();
        self.probe.connected.store(true, Ordering::SeqCst);
        debug!(sensor = %self.name, mode = %config.lidar_mode, "mock sensor reset");
        Ok(self.handshake_metadata(config))
    }

    fn generate_column(&mut self) -> RawColumn {
        let width = self.lidar_mode.columns_per_frame();
        let period_ns = NANOS_PER_SEC / self.lidar_mode.column_rate_hz() as u64;
        let state = &mut self.generator;

        let m = state.next_measurement;
        // A room: walls farther away towards the diagonals
        let angle = std::f64::consts::TAU * m as f64 / width as f64;
        let range_mm = (8_000.0 / angle.cos().abs().max(angle.sin().abs())) as u32;

        let mut column = Self::column(m, state.next_timestamp_ns, self.config.beams, range_mm);
        column.frame_id = state.frame_id;

        state.next_timestamp_ns += period_ns;
        state.columns += 1;
        state.next_measurement += 1;
        if state.next_measurement as usize >= width {
            state.next_measurement = 0;
            state.frame_id = state.frame_id.wrapping_add(1);
        }
        if self.config.imu_every > 0 && state.columns % self.config.imu_every == 0 {
            state.imu_pending = true;
        }
        column
    }

    fn generate_imu(&mut self) -> Option<ImuSample> {
        if !std::mem::take(&mut self.generator.imu_pending) {
            return None;
        }
        let ts = self.generator.next_timestamp_ns;
        Some(ImuSample {
            sys_timestamp_ns: ts,
            accel_timestamp_ns: ts,
            gyro_timestamp_ns: ts,
            accel: [0.0, 0.0, 1.0],
            gyro: [0.0, 0.0, 0.0],
        })
    }
}

impl SensorInterface for MockSensor {
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
        if !self.is_connected() {
            return None;
        }
        let column = match self.lidar.pop_front() {
            Some(column) => column,
            None if self.config.generate => self.generate_column(),
            None => return None,
        };
        trace!(sensor = %self.name, measurement_id = column.measurement_id, "mock column");
        self.metrics.record_columns(1, 0);
        Some(column)
    }

    fn poll_imu(&mut self) -> Option<ImuSample> {
        if !self.is_connected() {
            return None;
        }
        let sample = match self.imu.pop_front() {
            Some(sample) => Some(sample),
            None if self.config.generate => self.generate_imu(),
            None => None,
        };
        if sample.is_some() {
            self.metrics.record_imu();
        }
        sample
    }

    fn close(&mut self) {
        self.probe.close_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.probe.is_connected()
    }

    fn stats(&self) -> SourceStats {
        self.metrics.snapshot()
    }
}
