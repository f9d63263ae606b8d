//! LifecycleController - the managed state machine owning every driver resource

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arc_swap::{ArcSwap, ArcSwapOption};
use contracts::{
    ContractError, Metadata, Parameters, SensorInterface, SinkConfig, Timestamp,
    TransformBroadcaster,
};
use dispatcher::{create_dispatcher, Dispatcher, DispatcherError, LogTransformBroadcaster};
use ingestion::{codec::COLUMNS_PER_PACKET, AssemblerMetrics, Os1Sensor};
use processing::{static_transforms, ProcessorMetrics};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, instrument, warn};

use crate::cycle::{spawn_cycle, CycleHandle};
use crate::error::{DriverError, Result};
use crate::metrics::{DriverMetrics, DriverStats};
use crate::pipeline::Pipeline;
use crate::services::ServiceHandle;
use crate::state::{LifecycleState, Transition};

/// Creates the packet source at every configure
pub type SensorFactory = Box<dyn Fn() -> Box<dyn SensorInterface> + Send + Sync>;

/// Creates the publishers at every configure
pub type DispatcherFactory =
    Box<dyn Fn() -> std::result::Result<Dispatcher, DispatcherError> + Send + Sync>;

/// Cycle tuning
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Period of the processing cycle (OS-1 datagram rate: 1280 Hz)
    pub cycle_period: Duration,
    /// Columns drained per cycle at most
    pub columns_per_cycle: usize,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            cycle_period: Duration::from_nanos(781_250),
            columns_per_cycle: COLUMNS_PER_PACKET,
        }
    }
}

/// State reachable from both the controller and the services
pub(crate) struct Shared {
    pub(crate) state: watch::Sender<LifecycleState>,
    pub(crate) parameters: ArcSwap<Parameters>,
    pub(crate) sensor: Mutex<Option<Box<dyn SensorInterface>>>,
    pub(crate) metadata: ArcSwapOption<Metadata>,
    pub(crate) metrics: Arc<DriverMetrics>,
}

impl Shared {
    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }
}

/// Builder for [`LifecycleController`]
pub struct LifecycleControllerBuilder {
    parameters: Parameters,
    sensor_factory: Option<SensorFactory>,
    dispatcher_factory: Option<DispatcherFactory>,
    broadcaster: Option<Arc<dyn TransformBroadcaster>>,
    options: DriverOptions,
}

impl LifecycleControllerBuilder {
    /// Packet source variant; defaults to the OS-1
    pub fn sensor<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SensorInterface> + Send + Sync + 'static,
    {
        self.sensor_factory = Some(Box::new(factory));
        self
    }

    /// Publishers built from a sink routing table
    pub fn sinks(mut self, sinks: Vec<SinkConfig>) -> Self {
        self.dispatcher_factory = Some(Box::new(move || create_dispatcher(sinks.clone())));
        self
    }

    /// Publishers built by the caller (in-process consumers)
    pub fn dispatcher<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> std::result::Result<Dispatcher, DispatcherError> + Send + Sync + 'static,
    {
        self.dispatcher_factory = Some(Box::new(factory));
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn TransformBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> LifecycleController {
        let (state, _) = watch::channel(LifecycleState::Unconfigured);
        let shared = Arc::new(Shared {
            state,
            parameters: ArcSwap::from_pointee(self.parameters),
            sensor: Mutex::new(None),
            metadata: ArcSwapOption::empty(),
            metrics: Arc::new(DriverMetrics::new()),
        });

        LifecycleController {
            shared,
            sensor_factory: self
                .sensor_factory
                .unwrap_or_else(|| Box::new(|| Box::new(Os1Sensor::new("os1")))),
            dispatcher_factory: self
                .dispatcher_factory
                .unwrap_or_else(|| Box::new(|| Ok(Dispatcher::with_handles(Vec::new())))),
            broadcaster: self
                .broadcaster
                .unwrap_or_else(|| Arc::new(LogTransformBroadcaster)),
            options: self.options,
            processor_metrics: Arc::new(ProcessorMetrics::new()),
            assembler_metrics: Arc::new(AssemblerMetrics::default()),
            dispatcher: None,
            pipeline: None,
            cycle: None,
        }
    }
}

/// Lifecycle state machine of the driver
///
/// Transitions take `&mut self`, so they are serialized by construction.
/// Services run concurrently through [`ServiceHandle`].
pub struct LifecycleController {
    shared: Arc<Shared>,
    sensor_factory: SensorFactory,
    dispatcher_factory: DispatcherFactory,
    broadcaster: Arc<dyn TransformBroadcaster>,
    options: DriverOptions,
    processor_metrics: Arc<ProcessorMetrics>,
    assembler_metrics: Arc<AssemblerMetrics>,
    dispatcher: Option<Arc<Dispatcher>>,
    /// Held while Inactive
    pipeline: Option<Pipeline>,
    /// Held while Active
    cycle: Option<CycleHandle>,
}

impl LifecycleController {
    pub fn builder(parameters: Parameters) -> LifecycleControllerBuilder {
        LifecycleControllerBuilder {
            parameters,
            sensor_factory: None,
            dispatcher_factory: None,
            broadcaster: None,
            options: DriverOptions::default(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.shared.state.subscribe()
    }

    /// Handle for the reset / get_metadata services
    pub fn services(&self) -> ServiceHandle {
        ServiceHandle::new(Arc::clone(&self.shared))
    }

    pub fn parameters(&self) -> Arc<Parameters> {
        self.shared.parameters.load_full()
    }

    /// Replace the parameters; they take effect at the next configure or reset
    pub fn set_parameters(&self, parameters: Parameters) -> Result<()> {
        self.services().set_parameters(parameters)
    }

    /// Current metadata regardless of state
    pub fn metadata(&self) -> Option<Arc<Metadata>> {
        self.shared.metadata.load_full()
    }

    pub fn stats(&self) -> DriverStats {
        let source = match self.shared.sensor.try_lock() {
            Ok(guard) => guard.as_ref().map(|sensor| sensor.stats()),
            Err(_) => None,
        };

        DriverStats {
            state: self.state(),
            cycle: self.shared.metrics.snapshot(),
            source,
            assembler: self.assembler_metrics.snapshot(),
            processors: self.processor_metrics.snapshot(),
            dispatcher: self.dispatcher.as_ref().map(|d| d.stats()),
            frames: self.shared.metrics.frame_summary(),
        }
    }

    /// Unconfigured (or ErrorProcessing) → Inactive
    ///
    /// Missing addresses fail before any socket is opened; the error is fatal.
    #[instrument(name = "lifecycle_configure", skip(self))]
    pub async fn configure(&mut self) -> Result<()> {
        let target = self.check(Transition::Configure)?;
        if self.state() == LifecycleState::ErrorProcessing {
            self.release().await;
        }

        match self.configure_inner().await {
            Ok(()) => {
                self.commit(Transition::Configure, target);
                Ok(())
            }
            Err(e) => Err(self.fail(Transition::Configure, e).await),
        }
    }

    async fn configure_inner(&mut self) -> Result<()> {
        let parameters = self.shared.parameters.load_full();
        let config = parameters.to_configuration()?;

        let mut sensor = (self.sensor_factory)();
        let metadata = sensor.connect(&config).await?;
        let sensor_name = sensor.name().to_string();
        // Held from here on so a later failure closes it through release()
        *self.shared.sensor.lock().await = Some(sensor);
        metadata.validate()?;

        let frames = parameters.frames();
        let transforms = static_transforms(&metadata, &frames, now());
        self.broadcaster.send_static_transforms(&transforms)?;

        let dispatcher = Arc::new((self.dispatcher_factory)()?);
        self.pipeline = Some(Pipeline::new(
            Arc::clone(&dispatcher),
            frames,
            &self.processor_metrics,
            Arc::clone(&self.assembler_metrics),
            Arc::clone(&self.shared.metrics),
            self.options.columns_per_cycle,
        ));
        self.dispatcher = Some(dispatcher);

        info!(
            sensor = %sensor_name,
            hostname = %metadata.hostname,
            serial = %metadata.sensor_info.prod_sn,
            mode = %metadata.lidar_mode,
            beams = metadata.beams(),
            "sensor configured"
        );
        self.shared.metadata.store(Some(Arc::new(metadata)));
        Ok(())
    }

    /// Inactive → Active: arm the publishers and start the cycle
    #[instrument(name = "lifecycle_activate", skip(self))]
    pub async fn activate(&mut self) -> Result<()> {
        let target = self.check(Transition::Activate)?;

        let (Some(dispatcher), Some(pipeline)) = (self.dispatcher.clone(), self.pipeline.take())
        else {
            let e = ContractError::Other("activate without configured resources".into());
            return Err(self.fail(Transition::Activate, e.into()).await);
        };
        dispatcher.arm();
        self.cycle = Some(spawn_cycle(
            self.options.cycle_period,
            Arc::clone(&self.shared),
            pipeline,
        ));

        self.commit(Transition::Activate, target);
        Ok(())
    }

    /// Active → Inactive: disarm, then stop and join the cycle.
    /// Waits for a running reset to finish. The sensor connection and
    /// metadata stay.
    #[instrument(name = "lifecycle_deactivate", skip(self))]
    pub async fn deactivate(&mut self) -> Result<()> {
        let target = self.check(Transition::Deactivate)?;

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.disarm();
        }
        if let Some(cycle) = self.cycle.take() {
            match cycle.stop().await {
                Ok(pipeline) => self.pipeline = Some(pipeline),
                Err(e) => return Err(self.fail(Transition::Deactivate, e).await),
            }
        }
        // A reset in flight completes while still Active
        drop(self.shared.sensor.lock().await);

        self.commit(Transition::Deactivate, target);
        Ok(())
    }

    /// Inactive → Unconfigured: release sensor, metadata and publishers
    #[instrument(name = "lifecycle_cleanup", skip(self))]
    pub async fn cleanup(&mut self) -> Result<()> {
        let target = self.check(Transition::Cleanup)?;
        self.release().await;
        self.commit(Transition::Cleanup, target);
        Ok(())
    }

    /// Any live state → Finalized
    #[instrument(name = "lifecycle_shutdown", skip(self))]
    pub async fn shutdown(&mut self) -> Result<()> {
        let target = self.check(Transition::Shutdown)?;
        self.release().await;
        self.commit(Transition::Shutdown, target);
        Ok(())
    }

    /// Any live state → ErrorProcessing. Resources are released; only an
    /// external `configure` (or `shutdown`) leaves the state.
    #[instrument(name = "lifecycle_on_error", skip(self))]
    pub async fn on_error(&mut self, reason: &str) -> Result<()> {
        let target = self.check(Transition::Error)?;
        error!(reason, "entering error processing");
        self.release().await;
        self.commit(Transition::Error, target);
        Ok(())
    }

    fn check(&self, transition: Transition) -> Result<LifecycleState> {
        let from = self.state();
        from.next(transition).ok_or_else(|| {
            warn!(from = %from, transition = %transition, "rejected transition");
            DriverError::invalid_transition(from, transition)
        })
    }

    fn commit(&self, transition: Transition, target: LifecycleState) {
        let from = self.shared.state.send_replace(target);
        observability::record_transition(transition.as_str(), true);
        info!(from = %from, to = %target, transition = %transition, "lifecycle transition");
    }

    /// Failed transition: tear down and park in ErrorProcessing
    async fn fail(&mut self, transition: Transition, e: DriverError) -> DriverError {
        observability::record_transition(transition.as_str(), false);
        error!(transition = %transition, error = %e, fatal = e.is_fatal(), "transition failed");
        self.release().await;
        let from = self.shared.state.send_replace(LifecycleState::ErrorProcessing);
        info!(from = %from, to = %LifecycleState::ErrorProcessing, "lifecycle transition");
        e
    }

    async fn release(&mut self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.disarm();
        }
        if let Some(cycle) = self.cycle.take() {
            if let Err(e) = cycle.stop().await {
                warn!(error = %e, "cycle did not stop cleanly");
            }
        }
        self.pipeline = None;

        if let Some(mut sensor) = self.shared.sensor.lock().await.take() {
            sensor.close();
            info!(sensor = %sensor.name(), "sensor closed");
        }
        self.shared.metadata.store(None);

        if let Some(dispatcher) = self.dispatcher.take() {
            match Arc::try_unwrap(dispatcher) {
                Ok(dispatcher) => dispatcher.shutdown().await,
                Err(_) => warn!("publishers still referenced, dropped without draining"),
            }
        }
    }
}

fn now() -> Timestamp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    Timestamp::from_nanos(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Topic;
    use dispatcher::{MemorySink, MemorySinkReader, RecordingTransformBroadcaster, SinkHandle};
    use ingestion::{MockProbe, MockSensor, MockSensorConfig};
    use std::sync::Mutex as StdMutex;

    type Probes = Arc<StdMutex<Vec<Arc<MockProbe>>>>;

    fn parameters() -> Parameters {
        Parameters::with_addresses("127.0.0.1", "127.0.0.1")
    }

    fn fast() -> DriverOptions {
        DriverOptions {
            cycle_period: Duration::from_millis(1),
            columns_per_cycle: 64,
        }
    }

    fn mock_config(generate: bool) -> MockSensorConfig {
        MockSensorConfig {
            beams: 4,
            generate,
            ..Default::default()
        }
    }

    /// Controller over mock sensors; every created sensor's probe is recorded
    fn controller(
        parameters: Parameters,
        config: MockSensorConfig,
    ) -> (LifecycleController, Probes, MemorySinkReader) {
        let probes: Probes = Arc::default();
        let recorded = Arc::clone(&probes);
        let (sink, reader) = MemorySink::new("mem");
        let sink = StdMutex::new(Some(sink));

        let controller = LifecycleController::builder(parameters)
            .sensor(move || {
                let sensor = MockSensor::new("mock", config.clone());
                recorded.lock().unwrap().push(sensor.probe());
                Box::new(sensor)
            })
            .dispatcher(move || {
                let handles = sink
                    .lock()
                    .unwrap()
                    .take()
                    .map(|s| vec![SinkHandle::spawn(s, 1024)])
                    .unwrap_or_default();
                Ok(Dispatcher::with_handles(handles))
            })
            .options(fast())
            .build();
        (controller, probes, reader)
    }

    fn probe(probes: &Probes) -> Arc<MockProbe> {
        Arc::clone(probes.lock().unwrap().last().unwrap())
    }

    #[tokio::test]
    async fn test_missing_address_is_fatal_before_connect() {
        let mut params = parameters();
        params.lidar_ip = None;
        let (mut controller, probes, _) = controller(params, mock_config(false));

        let err = controller.configure().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("lidar_ip"));
        assert!(probes.lock().unwrap().is_empty(), "no sensor was created");
        assert_eq!(controller.state(), LifecycleState::ErrorProcessing);
    }

    #[tokio::test]
    async fn test_activate_then_deactivate_publishes_nothing() {
        let (mut controller, probes, reader) = controller(parameters(), mock_config(false));
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();
        controller.deactivate().await.unwrap();

        assert_eq!(controller.state(), LifecycleState::Inactive);
        assert!(probe(&probes).is_connected());
        assert!(controller.metadata().is_some());
        assert_eq!(controller.stats().cycle.frames_published, 0);

        controller.cleanup().await.unwrap();
        assert!(reader.is_empty());
    }

    #[tokio::test]
    async fn test_full_lifecycle_publishes_frames() {
        let (mut controller, probes, reader) = controller(parameters(), mock_config(true));
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while controller.stats().cycle.frames_published < 2 {
            assert!(tokio::time::Instant::now() < deadline, "no frames published");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        controller.deactivate().await.unwrap();
        let published = controller.stats().cycle.frames_published;

        controller.cleanup().await.unwrap();
        assert_eq!(controller.state(), LifecycleState::Unconfigured);
        assert!(!probe(&probes).is_connected());
        assert!(controller.metadata().is_none());

        assert_eq!(reader.count(Topic::Points) as u64, published);
        assert_eq!(reader.count(Topic::RangeImage) as u64, published);
        assert!(reader.count(Topic::Imu) > 0);

        // Frame ids increase with publish order
        let seqs: Vec<u64> = reader
            .messages()
            .iter()
            .filter(|m| m.topic() == Topic::Points)
            .map(|m| m.header().seq)
            .collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_nothing_published_after_deactivate() {
        let (mut controller, _, reader) = controller(parameters(), mock_config(true));
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        controller.deactivate().await.unwrap();

        let cycles = controller.stats().cycle.cycles;
        let suppressed = controller.stats().dispatcher.unwrap().suppressed;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.stats().cycle.cycles, cycles);
        assert_eq!(controller.stats().dispatcher.unwrap().suppressed, suppressed);

        controller.shutdown().await.unwrap();
        assert!(reader.len() > 0);
    }

    #[tokio::test]
    async fn test_invalid_transitions_leave_state() {
        let (mut controller, _, _) = controller(parameters(), mock_config(false));

        let err = controller.activate().await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidTransition {
                from: LifecycleState::Unconfigured,
                transition: Transition::Activate
            }
        ));
        assert_eq!(controller.state(), LifecycleState::Unconfigured);
        assert!(controller.deactivate().await.is_err());
        assert!(controller.cleanup().await.is_err());

        controller.configure().await.unwrap();
        assert!(controller.configure().await.is_err());
        assert_eq!(controller.state(), LifecycleState::Inactive);

        controller.activate().await.unwrap();
        assert!(controller.cleanup().await.is_err());
        assert_eq!(controller.state(), LifecycleState::Active);
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_then_external_configure() {
        let (mut controller, probes, _) = controller(parameters(), mock_config(false));
        controller.configure().await.unwrap();
        controller.cleanup().await.unwrap();

        // Fail the next sensor by failing the probe of a sensor created up front
        let failing: Probes = Arc::default();
        let recorded = Arc::clone(&failing);
        controller.sensor_factory = Box::new(move || {
            let sensor = MockSensor::new("mock", mock_config(false));
            let probe = sensor.probe();
            probe.set_fail_connect(recorded.lock().unwrap().is_empty());
            recorded.lock().unwrap().push(probe);
            Box::new(sensor)
        });

        let err = controller.configure().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(controller.state(), LifecycleState::ErrorProcessing);
        assert!(controller.metadata().is_none());
        assert!(controller.activate().await.is_err());

        controller.configure().await.unwrap();
        assert_eq!(controller.state(), LifecycleState::Inactive);
        assert_eq!(failing.lock().unwrap().len(), 2);
        assert_eq!(probes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_static_transforms_announced_on_configure() {
        let tf = Arc::new(RecordingTransformBroadcaster::new());
        let mut controller = LifecycleController::builder(parameters())
            .sensor(|| Box::new(MockSensor::new("mock", mock_config(false))))
            .broadcaster(tf.clone())
            .options(fast())
            .build();

        controller.configure().await.unwrap();
        let transforms = tf.transforms();
        assert_eq!(tf.announcements(), 1);
        assert_eq!(transforms.len(), 2);
        assert!(transforms
            .iter()
            .all(|t| t.header.frame_id == "laser_sensor_frame"));
        let children: Vec<&str> = transforms.iter().map(|t| t.child_frame_id.as_str()).collect();
        assert!(children.contains(&"imu_data_frame"));
        assert!(children.contains(&"laser_data_frame"));

        controller.activate().await.unwrap();
        controller.services().reset().await.unwrap();
        assert_eq!(tf.announcements(), 1, "reset does not re-announce");
        controller.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_watch_and_shutdown() {
        let (mut controller, probes, _) = controller(parameters(), mock_config(false));
        let mut rx = controller.subscribe();

        controller.configure().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Inactive);

        controller.activate().await.unwrap();
        controller.shutdown().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Finalized);
        assert_eq!(probe(&probes).close_calls(), 1);

        for result in [
            controller.configure().await,
            controller.shutdown().await,
            controller.on_error("late").await,
        ] {
            assert!(matches!(
                result,
                Err(DriverError::InvalidTransition {
                    from: LifecycleState::Finalized,
                    ..
                })
            ));
        }
        assert!(matches!(
            controller.set_parameters(parameters()),
            Err(DriverError::Finalized)
        ));
    }

    #[tokio::test]
    async fn test_on_error_releases_resources() {
        let (mut controller, probes, _) = controller(parameters(), mock_config(true));
        controller.configure().await.unwrap();
        controller.activate().await.unwrap();

        controller.on_error("sensor unplugged").await.unwrap();
        assert_eq!(controller.state(), LifecycleState::ErrorProcessing);
        assert!(!probe(&probes).is_connected());
        assert!(controller.metadata().is_none());
        assert!(controller.services().get_metadata().is_none());
    }
}
