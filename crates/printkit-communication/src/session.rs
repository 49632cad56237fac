//! Printer session and scheduler
//!
//! A session owns one serial connection for its lifetime. All mutation of
//! the state machine, the queue cursor, the in-flight slot, and the
//! temperature record happens on a single scheduler task; client-facing
//! entry points enqueue operations over a channel and return promptly.
//!
//! The scheduler paces dequeues against firmware acknowledgements (at most
//! one line in flight), interleaves periodic temperature polling and port
//! rescans, streams print jobs, and publishes state, progress, and
//! temperature changes on the session's event bus.

use crate::firmware::{DialectRegistry, FirmwareDialect, ReplyKind};
use crate::job::PrintJob;
use crate::queue::CommandQueue;
use crate::transport::serial::{SerialTransport, SystemPorts};
use crate::transport::{PortEnumerator, Transport};
use parking_lot::RwLock;
use printkit_core::{
    Axis, GCommand, MCommand, PrinterEvent, PrinterState, ProtocolError, Result, SchedulerConfig,
    StateError, SubscriptionId, Temperature, TransportError, Units,
};
use printkit_core::{EventBus, JobError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Wall-clock window for firmware auto-detection
const DETECTION_TIMEOUT: Duration = Duration::from_millis(3000);

/// Queue depth the print job keeps topped up; one entry preserves the
/// one-ack-in-flight pacing
const JOB_QUEUE_LIMIT: usize = 1;

/// Host-side tolerance for releasing the heat-and-wait status flag
const HEAT_EPSILON: f32 = 0.5;

/// Operations sent from the session facade to the scheduler task
enum SessionOp {
    LoadFirmware(String),
    DetectFirmware,
    PushCommand(String),
    Print(PrintJob),
    Stop,
    EmergencyStop,
    Pause(String),
    Resume,
    SetSerialTimerInterval(u16),
    Close,
}

/// Heat-and-wait currently gating the firmware
#[derive(Debug, Clone, Copy)]
enum HeatWait {
    Extruder(f32),
    Bed(f32),
}

/// State snapshot shared between the scheduler and the session getters
#[derive(Debug, Clone)]
struct Snapshot {
    state: PrinterState,
    temperature: Temperature,
    progress: f32,
    firmware: Option<String>,
    job_active: bool,
    job_paused: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: PrinterState::Connecting,
            temperature: Temperature::default(),
            progress: 0.0,
            firmware: None,
            job_active: false,
            job_paused: false,
        }
    }
}

/// A live connection to a printer
///
/// Created with [`Session::open`] (serial) or [`Session::with_transport`]
/// (any transport). Dropping the session tears the connection down.
pub struct Session {
    ops: mpsc::UnboundedSender<SessionOp>,
    shared: Arc<RwLock<Snapshot>>,
    events: Arc<EventBus>,
    registry: Arc<RwLock<DialectRegistry>>,
    port: String,
}

impl Session {
    /// Open a serial connection to `port` at `baud`
    ///
    /// On return the session is in `Connecting` and firmware detection has
    /// been started. Must be called within a Tokio runtime.
    pub fn open(port: &str, baud: u32) -> Result<Session> {
        let transport = SerialTransport::open(port, baud)?;
        Ok(Self::with_transport(
            Box::new(transport),
            Box::new(SystemPorts),
            port,
            SchedulerConfig::default(),
        ))
    }

    /// Start a session over an arbitrary transport
    ///
    /// Used directly by tests and by embedders with their own byte streams.
    pub fn with_transport(
        mut transport: Box<dyn Transport>,
        enumerator: Box<dyn PortEnumerator>,
        port: impl Into<String>,
        config: SchedulerConfig,
    ) -> Session {
        let lines = transport.take_lines().unwrap_or_else(|| {
            // A transport without a line channel reads as an immediately
            // lost connection.
            let (_tx, rx) = mpsc::unbounded_channel();
            rx
        });

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(RwLock::new(Snapshot::default()));
        let events = Arc::new(EventBus::default());
        let registry = Arc::new(RwLock::new(DialectRegistry::with_builtin()));

        let scheduler = Scheduler {
            transport,
            enumerator,
            registry: registry.clone(),
            dialect: None,
            queue: CommandQueue::new(),
            job: None,
            temperature: Temperature::default(),
            state: PrinterState::Connecting,
            in_flight: None,
            awaiting_position: false,
            heat_wait: None,
            stop_pending: false,
            stop_had_job: false,
            last_ports: Vec::new(),
            last_progress: None,
            detect_deadline: None,
            config,
            config_dirty: false,
            shared: shared.clone(),
            events: events.clone(),
            closing: false,
        };

        tokio::spawn(scheduler.run(lines, ops_rx));

        Session {
            ops: ops_tx,
            shared,
            events,
            registry,
            port: port.into(),
        }
    }

    /// Current printer state
    pub fn state(&self) -> PrinterState {
        self.shared.read().state
    }

    /// Last reported temperatures
    pub fn temperature(&self) -> Temperature {
        self.shared.read().temperature
    }

    /// Print progress as a percentage
    pub fn percentage_printed(&self) -> f32 {
        self.shared.read().progress
    }

    /// The port this session is connected to, or empty when disconnected
    pub fn connected_port(&self) -> String {
        if self.state() == PrinterState::Disconnected {
            String::new()
        } else {
            self.port.clone()
        }
    }

    /// Name of the loaded firmware dialect, if any
    pub fn firmware_name(&self) -> Option<String> {
        self.shared.read().firmware.clone()
    }

    /// Number of extruders
    pub fn extruder_count(&self) -> usize {
        1
    }

    /// Get a receiver for session events
    pub fn events(&self) -> broadcast::Receiver<PrinterEvent> {
        self.events.receiver()
    }

    /// Register a synchronous event handler
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&PrinterEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Remove a previously registered event handler
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Names of the firmware dialects this session can load
    pub fn available_firmware_dialects(&self) -> Vec<String> {
        self.registry.read().names()
    }

    /// Register an additional firmware dialect with this session
    pub fn register_dialect(&self, dialect: Arc<dyn FirmwareDialect>) {
        self.registry.write().register(dialect);
    }

    /// Load a firmware dialect by name
    pub fn load_firmware(&self, name: &str) -> Result<()> {
        let state = self.state();
        if !matches!(state, PrinterState::Connecting | PrinterState::Idle) {
            return Err(StateError::not_permitted("load_firmware", state).into());
        }
        if self.registry.read().get(name).is_none() {
            return Err(ProtocolError::UnknownDialect {
                name: name.to_string(),
            }
            .into());
        }
        self.send(SessionOp::LoadFirmware(name.to_string()))
    }

    /// Re-issue the firmware detection request
    pub fn detect_firmware(&self) -> Result<()> {
        let state = self.state();
        if state != PrinterState::Connecting {
            return Err(StateError::not_permitted("detect_firmware", state).into());
        }
        self.send(SessionOp::DetectFirmware)
    }

    /// Push a command line into the queue
    pub fn push_command(&self, line: impl Into<String>) -> Result<()> {
        let state = self.state();
        if !state.is_connected() || state == PrinterState::Error {
            return Err(StateError::not_permitted("push_command", state).into());
        }
        self.send(SessionOp::PushCommand(line.into()))
    }

    /// Start printing a G-code file
    pub fn print(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.shared.read().clone();
        if snapshot.state != PrinterState::Idle || snapshot.job_active {
            return Err(StateError::not_permitted("print", snapshot.state).into());
        }
        let job = PrintJob::start(path)?;
        self.send(SessionOp::Print(job))
    }

    /// Stop the printer, emptying the queue and aborting any print job
    pub fn stop(&self) -> Result<()> {
        let state = self.state();
        if !state.is_connected() || state == PrinterState::Error {
            return Err(StateError::not_permitted("stop", state).into());
        }
        self.send(SessionOp::Stop)
    }

    /// Stop the printer via the emergency stop command (M112)
    ///
    /// The queue is discarded and no further commands are accepted until a
    /// new session is established.
    pub fn emergency_stop(&self) -> Result<()> {
        let state = self.state();
        if !state.is_connected() {
            return Err(StateError::not_permitted("emergency_stop", state).into());
        }
        self.send(SessionOp::EmergencyStop)
    }

    /// Pause an in-process print job
    ///
    /// Sends `M114` first to store the position the head stopped at, then
    /// each comma-separated line of `pause_actions` in order.
    pub fn pause(&self, pause_actions: &str) -> Result<()> {
        let snapshot = self.shared.read().clone();
        if snapshot.state != PrinterState::Busy || !snapshot.job_active || snapshot.job_paused {
            return Err(StateError::not_permitted("pause", snapshot.state).into());
        }
        self.send(SessionOp::Pause(pause_actions.to_string()))
    }

    /// Resume a paused print job, returning to the pause position first
    pub fn resume(&self) -> Result<()> {
        let snapshot = self.shared.read().clone();
        if snapshot.state != PrinterState::Paused || !snapshot.job_paused {
            return Err(StateError::not_permitted("resume", snapshot.state).into());
        }
        self.send(SessionOp::Resume)
    }

    /// Home the given axes; an empty mask homes all
    pub fn home(&self, axes: Axis) -> Result<()> {
        let letters: Vec<String> = axes.letters().into_iter().map(String::from).collect();
        let args: Vec<&str> = letters.iter().map(String::as_str).collect();
        self.push_command(GCommand::G28.command(&args))
    }

    /// Home all axes
    pub fn home_all(&self) -> Result<()> {
        self.home(Axis::NONE)
    }

    /// Move a single axis by `distance` (or to it, in absolute mode)
    pub fn move_axis(&self, axis: Axis, distance: f32) -> Result<()> {
        let Some(letter) = axis.letter() else {
            return Err(
                StateError::not_permitted("move with other than one axis", self.state()).into(),
            );
        };
        self.push_command(GCommand::G1.command(&[&format!("{}{}", letter, distance)]))
    }

    /// Set extruder temperature; `wait` blocks the firmware until reached
    pub fn set_extruder_temp(&self, temp: u32, extruder: u32, wait: bool) -> Result<()> {
        let opcode = if wait { MCommand::M109 } else { MCommand::M104 };
        self.push_command(opcode.command(&[&format!("S{}", temp), &format!("T{}", extruder)]))
    }

    /// Set bed temperature; `wait` blocks the firmware until reached
    pub fn set_bed_temp(&self, temp: u32, wait: bool) -> Result<()> {
        let opcode = if wait { MCommand::M190 } else { MCommand::M140 };
        self.push_command(opcode.command(&[&format!("S{}", temp)]))
    }

    /// Set a fan's speed, 0-100
    pub fn set_fan_speed(&self, speed: u32, fan: u32) -> Result<()> {
        // The firmware expects a PWM count.
        let pwm = (speed.min(100) * 255) / 100;
        self.push_command(MCommand::M106.command(&[&format!("P{}", fan), &format!("S{}", pwm)]))
    }

    /// Set the printer to absolute position mode
    pub fn set_absolute_position(&self) -> Result<()> {
        self.push_command(GCommand::G90.code())
    }

    /// Set the printer to relative position mode
    pub fn set_relative_position(&self) -> Result<()> {
        self.push_command(GCommand::G91.code())
    }

    /// Disable idle hold of the motors after `delay_s` seconds; 0 is no delay
    pub fn set_idle_hold(&self, delay_s: u32) -> Result<()> {
        if delay_s > 0 {
            self.push_command(MCommand::M84.command(&[&format!("S{}", delay_s)]))
        } else {
            self.push_command(MCommand::M84.code())
        }
    }

    /// Set the printer speed factor, in percent
    pub fn set_printer_speed(&self, percent: u32) -> Result<()> {
        self.push_command(MCommand::M220.command(&[&format!("S{}", percent)]))
    }

    /// Set the extruder flow rate, in percent
    pub fn set_flow_rate(&self, percent: u32) -> Result<()> {
        self.push_command(MCommand::M221.command(&[&format!("S{}", percent)]))
    }

    /// Select the measurement units the firmware should use
    pub fn set_units(&self, units: Units) -> Result<()> {
        let opcode = match units {
            Units::Metric => GCommand::G21,
            Units::Imperial => GCommand::G20,
        };
        self.push_command(opcode.code())
    }

    /// Show a message on the printer's display
    pub fn show_message(&self, message: &str) -> Result<()> {
        self.push_command(MCommand::M117.command(&[message]))
    }

    /// Set the interval between serial port rescans; 0 disables them
    pub fn set_serial_timer_interval(&self, ms: u16) -> Result<()> {
        self.send(SessionOp::SetSerialTimerInterval(ms))
    }

    /// Close the session: cancel timers, discard the queue, close the port
    pub fn close(&self) {
        let _ = self.ops.send(SessionOp::Close);
    }

    fn send(&self, op: SessionOp) -> Result<()> {
        self.ops
            .send(op)
            .map_err(|_| TransportError::Closed.into())
    }
}

/// The scheduler: sole owner of the transport, queue, job, and state machine
struct Scheduler {
    transport: Box<dyn Transport>,
    enumerator: Box<dyn PortEnumerator>,
    registry: Arc<RwLock<DialectRegistry>>,
    dialect: Option<Arc<dyn FirmwareDialect>>,
    queue: CommandQueue,
    job: Option<PrintJob>,
    temperature: Temperature,
    state: PrinterState,
    in_flight: Option<String>,
    awaiting_position: bool,
    heat_wait: Option<HeatWait>,
    stop_pending: bool,
    stop_had_job: bool,
    last_ports: Vec<String>,
    last_progress: Option<f32>,
    detect_deadline: Option<Instant>,
    config: SchedulerConfig,
    config_dirty: bool,
    shared: Arc<RwLock<Snapshot>>,
    events: Arc<EventBus>,
    closing: bool,
}

impl Scheduler {
    async fn run(
        mut self,
        mut lines: mpsc::UnboundedReceiver<Vec<u8>>,
        mut ops: mpsc::UnboundedReceiver<SessionOp>,
    ) {
        self.events
            .publish(PrinterEvent::StateChanged(PrinterState::Connecting));
        self.begin_detection();
        self.last_ports = self.enumerator.ports();

        let mut command_tick = make_interval(self.config.command_tick_ms, 100);
        let mut temperature_tick = make_interval(self.config.temperature_poll_ms, 5000);
        let mut port_tick = make_interval(self.config.serial_poll_interval_ms, 0);

        loop {
            if self.closing {
                break;
            }
            if self.config_dirty {
                port_tick = make_interval(self.config.serial_poll_interval_ms, 0);
                self.config_dirty = false;
            }

            let deadline = self.detect_deadline;
            tokio::select! {
                maybe_line = lines.recv() => match maybe_line {
                    Some(line) => self.handle_line(line),
                    None => self.fatal_transport(TransportError::Closed),
                },
                maybe_op = ops.recv() => match maybe_op {
                    Some(op) => self.handle_op(op),
                    // The session handle was dropped.
                    None => self.shutdown(),
                },
                _ = command_tick.tick() => self.command_tick(),
                _ = temperature_tick.tick() => self.temperature_tick(),
                _ = port_tick.tick() => self.port_tick(),
                _ = expiry(deadline) => self.detection_timeout(),
            }
        }
    }

    // ---- inbound ----

    fn handle_line(&mut self, bytes: Vec<u8>) {
        let text = String::from_utf8_lossy(&bytes).to_string();
        tracing::trace!("recv: {:?}", text);
        self.events.publish(PrinterEvent::ReceivedMessage(bytes));

        if self.state == PrinterState::Connecting {
            let detected = self.registry.read().detect(&text);
            if let Some(dialect) = detected {
                tracing::info!("Firmware detected: {}", dialect.name());
                self.install_dialect(dialect);
            }
            return;
        }

        let Some(dialect) = self.dialect.clone() else {
            return;
        };
        match dialect.classify(&text) {
            ReplyKind::Ack => self.handle_ack(&text),
            ReplyKind::Wait => tracing::debug!("Firmware is idle (wait)"),
            ReplyKind::TemperatureReport(report) => {
                self.handle_temperature(report);
                // A poll answer embeds its acknowledgement in the report.
                if dialect.is_acknowledgement(&text) {
                    self.handle_ack(&text);
                }
            }
            ReplyKind::Other => {}
        }
    }

    fn handle_ack(&mut self, raw: &str) {
        if self.awaiting_position {
            if let Some(line) = parse_position_line(raw) {
                if let Some(job) = self.job.as_mut() {
                    job.set_resume_position_line(line);
                }
                self.awaiting_position = false;
            }
        }

        self.in_flight = None;

        if self.stop_pending {
            self.finish_stop();
            return;
        }
        self.maybe_finish_print();
    }

    fn handle_temperature(&mut self, report: Temperature) {
        if self.temperature.apply(report) {
            self.shared.write().temperature = report;
            self.events.publish(PrinterEvent::TemperatureChanged(report));
        }

        if let Some(wait) = self.heat_wait {
            let (current, target) = match wait {
                HeatWait::Extruder(target) => (report.extruder_current, target),
                HeatWait::Bed(target) => (report.bed_current, target),
            };
            if (current - target).abs() <= HEAT_EPSILON {
                self.heat_wait = None;
                self.events.publish(PrinterEvent::PrinterStatusChanged(format!(
                    "Target temperature reached: {:.1}",
                    target
                )));
            }
        }
    }

    // ---- ticks ----

    fn command_tick(&mut self) {
        if !self.state.permits_dequeue() {
            return;
        }

        self.feed_job();
        if self.state == PrinterState::StartingPrint
            && self.job.as_ref().is_some_and(|j| j.is_active())
        {
            self.set_state(PrinterState::Busy);
        }

        if self.in_flight.is_none() && !self.queue.is_empty() {
            self.dispatch_next();
        }

        self.maybe_finish_print();
    }

    fn feed_job(&mut self) {
        let Some(job) = self.job.as_mut() else {
            return;
        };
        if !job.is_active() || job.is_paused() || self.queue.len() >= JOB_QUEUE_LIMIT {
            return;
        }

        match job.next_line() {
            Ok(Some(line)) => {
                let progress = job.progress();
                self.queue.push(line);
                self.publish_progress(progress);
            }
            Ok(None) => {
                let progress = job.progress();
                self.publish_progress(progress);
            }
            Err(e) => self.abort_job(e),
        }
    }

    fn dispatch_next(&mut self) {
        let Some(entry) = self.queue.pop() else {
            return;
        };
        let encoded = match &self.dialect {
            Some(dialect) => dialect.encode(&entry.line),
            None => {
                let mut bytes = entry.line.clone().into_bytes();
                bytes.push(b'\n');
                bytes
            }
        };

        if let Err(e) = self.transport.write(&encoded) {
            self.fatal_transport(e);
            return;
        }

        tracing::debug!("sent: {}", entry.line);
        self.note_heat_wait(&entry.line);
        self.in_flight = Some(entry.line);
    }

    fn temperature_tick(&mut self) {
        if self.config.temperature_poll_ms == 0 {
            return;
        }
        if !matches!(
            self.state,
            PrinterState::Idle | PrinterState::Busy | PrinterState::Paused
        ) {
            return;
        }
        if self.queue.is_empty() && self.in_flight.is_none() {
            self.queue.push(MCommand::M105.code());
        }
    }

    fn port_tick(&mut self) {
        if self.config.serial_poll_interval_ms == 0 {
            return;
        }
        let ports = self.enumerator.ports();
        if ports != self.last_ports {
            self.last_ports = ports.clone();
            self.events.publish(PrinterEvent::PortsChanged(ports));
        }
    }

    fn detection_timeout(&mut self) {
        self.detect_deadline = None;
        if self.state != PrinterState::Connecting {
            return;
        }
        let error = ProtocolError::DetectionTimeout {
            timeout_ms: DETECTION_TIMEOUT.as_millis() as u64,
        };
        tracing::warn!("{}", error);
        self.events.publish(PrinterEvent::Error(error.to_string()));
        self.set_state(PrinterState::Error);
    }

    // ---- operations ----

    fn handle_op(&mut self, op: SessionOp) {
        match op {
            SessionOp::LoadFirmware(name) => {
                let dialect = self.registry.read().get(&name);
                match dialect {
                    Some(dialect) => self.install_dialect(dialect),
                    None => tracing::warn!("Unknown firmware dialect: {}", name),
                }
            }
            SessionOp::DetectFirmware => self.begin_detection(),
            SessionOp::PushCommand(line) => {
                if self.state.is_connected() && self.state != PrinterState::Error {
                    self.queue.push(line);
                }
            }
            SessionOp::Print(job) => self.start_print(job),
            SessionOp::Pause(actions) => self.pause_print(&actions),
            SessionOp::Resume => self.resume_print(),
            SessionOp::Stop => self.stop_print(),
            SessionOp::EmergencyStop => self.emergency_stop(),
            SessionOp::SetSerialTimerInterval(ms) => {
                self.config.serial_poll_interval_ms = ms;
                self.config_dirty = true;
            }
            SessionOp::Close => self.shutdown(),
        }
    }

    fn start_print(&mut self, job: PrintJob) {
        if self.job.is_some() || self.state != PrinterState::Idle {
            tracing::warn!("print rejected in state {}", self.state);
            return;
        }
        tracing::info!("Printing {}", job.path().display());
        self.job = Some(job);
        self.last_progress = None;
        self.sync_job_flags();
        self.set_state(PrinterState::StartingPrint);
    }

    fn pause_print(&mut self, actions: &str) {
        let Some(job) = self.job.as_mut() else {
            return;
        };
        if job.is_paused() {
            return;
        }
        job.set_paused(true);
        self.awaiting_position = true;
        self.queue.push(MCommand::M114.code());
        for action in actions.split(',') {
            let action = action.trim();
            if !action.is_empty() {
                self.queue.push(action);
            }
        }
        self.sync_job_flags();
        self.set_state(PrinterState::Paused);
    }

    fn resume_print(&mut self) {
        let Some(job) = self.job.as_mut() else {
            return;
        };
        if !job.is_paused() {
            return;
        }
        if let Some(position) = job.take_resume_position_line() {
            self.queue.push(position);
        }
        job.set_paused(false);
        self.awaiting_position = false;
        self.sync_job_flags();
        self.set_state(PrinterState::Busy);
    }

    fn stop_print(&mut self) {
        self.queue.clear();
        self.stop_had_job = self.job.take().is_some();
        self.sync_job_flags();
        self.set_state(PrinterState::Stopping);
        if self.in_flight.is_none() {
            self.finish_stop();
        } else {
            self.stop_pending = true;
        }
    }

    fn finish_stop(&mut self) {
        self.stop_pending = false;
        if self.stop_had_job {
            self.stop_had_job = false;
            self.set_state(PrinterState::FinishedPrint);
        }
        self.set_state(PrinterState::Idle);
    }

    fn emergency_stop(&mut self) {
        tracing::warn!("Emergency stop");
        self.queue.clear();
        self.queue.push_front(MCommand::M112.code());
        // The abandoned in-flight line will never pair with an ack; the
        // emergency line goes out without waiting for one.
        self.in_flight = None;
        self.heat_wait = None;
        self.stop_pending = false;
        self.job = None;
        self.sync_job_flags();

        self.dispatch_next();
        if self.closing {
            return;
        }
        self.set_state(PrinterState::Error);
    }

    // ---- lifecycle ----

    fn begin_detection(&mut self) {
        if self.state != PrinterState::Connecting {
            return;
        }
        let mut request = MCommand::M115.code().as_bytes().to_vec();
        request.push(b'\n');
        if let Err(e) = self.transport.write(&request) {
            self.fatal_transport(e);
            return;
        }
        self.detect_deadline = Some(Instant::now() + DETECTION_TIMEOUT);
    }

    fn install_dialect(&mut self, dialect: Arc<dyn FirmwareDialect>) {
        self.shared.write().firmware = Some(dialect.name().to_string());
        self.dialect = Some(dialect);
        self.detect_deadline = None;
        if self.state == PrinterState::Connecting {
            self.set_state(PrinterState::Idle);
        }
    }

    fn maybe_finish_print(&mut self) {
        let done = matches!(
            self.state,
            PrinterState::Busy | PrinterState::StartingPrint
        ) && self
            .job
            .as_ref()
            .is_some_and(|j| !j.is_active() && !j.is_paused())
            && self.queue.is_empty()
            && self.in_flight.is_none();

        if done {
            self.job = None;
            self.sync_job_flags();
            self.set_state(PrinterState::FinishedPrint);
            self.set_state(PrinterState::Idle);
        }
    }

    fn abort_job(&mut self, error: JobError) {
        tracing::error!("Print job aborted: {}", error);
        self.events.publish(PrinterEvent::Error(error.to_string()));
        self.job = None;
        self.queue.clear();
        self.sync_job_flags();
        // The transport stays open; only the job is lost.
        self.set_state(PrinterState::Error);
    }

    fn fatal_transport(&mut self, error: TransportError) {
        if self.closing {
            return;
        }
        tracing::error!("Transport failure: {}", error);
        self.events.publish(PrinterEvent::Error(error.to_string()));
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.closing {
            return;
        }
        self.queue.clear();
        self.job = None;
        self.in_flight = None;
        self.detect_deadline = None;
        self.sync_job_flags();
        self.transport.close();
        self.set_state(PrinterState::Disconnected);
        self.closing = true;
    }

    // ---- helpers ----

    fn note_heat_wait(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("M109") {
            if let Some(target) = parse_s_value(rest) {
                self.heat_wait = Some(HeatWait::Extruder(target));
            }
        } else if let Some(rest) = line.strip_prefix("M190") {
            if let Some(target) = parse_s_value(rest) {
                self.heat_wait = Some(HeatWait::Bed(target));
            }
        }
    }

    fn publish_progress(&mut self, progress: f32) {
        if self.last_progress == Some(progress) {
            return;
        }
        self.last_progress = Some(progress);
        self.shared.write().progress = progress;
        self.events
            .publish(PrinterEvent::PrintProgressChanged(progress));
    }

    fn sync_job_flags(&self) {
        let mut shared = self.shared.write();
        shared.job_active = self.job.is_some();
        shared.job_paused = self.job.as_ref().is_some_and(|j| j.is_paused());
    }

    fn set_state(&mut self, new: PrinterState) {
        if self.state == new {
            return;
        }
        tracing::info!("State {} -> {}", self.state, new);
        self.state = new;
        self.shared.write().state = new;
        self.events.publish(PrinterEvent::StateChanged(new));
    }
}

/// Sleep until the detection deadline, or forever when none is armed
async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Build a ticker from a configured period, substituting `fallback_ms` for 0
///
/// A zero period with a zero fallback means the tick is disabled; the ticker
/// still exists but fires rarely and its handler returns immediately.
fn make_interval(period_ms: u16, fallback_ms: u16) -> tokio::time::Interval {
    let ms = if period_ms > 0 { period_ms } else { fallback_ms };
    let period = if ms > 0 {
        Duration::from_millis(ms as u64)
    } else {
        Duration::from_secs(3600)
    };
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Extract the move command back to a reported position
///
/// Parses `X:12.00 Y:34.00 Z:0.20 E:5.00 ok` into `G1 X12.00 Y34.00 Z0.20`.
fn parse_position_line(raw: &str) -> Option<String> {
    let mut x = None;
    let mut y = None;
    let mut z = None;
    for token in raw.split_whitespace() {
        if let Some(value) = token.strip_prefix("X:") {
            x = value.parse::<f32>().ok();
        } else if let Some(value) = token.strip_prefix("Y:") {
            y = value.parse::<f32>().ok();
        } else if let Some(value) = token.strip_prefix("Z:") {
            z = value.parse::<f32>().ok();
        }
    }
    match (x, y, z) {
        (Some(x), Some(y), Some(z)) => Some(format!("G1 X{:.2} Y{:.2} Z{:.2}", x, y, z)),
        _ => None,
    }
}

/// Parse the `S` parameter of a command tail, e.g. ` S210 T0`
fn parse_s_value(rest: &str) -> Option<f32> {
    rest.split_whitespace()
        .find_map(|token| token.strip_prefix('S'))
        .and_then(|value| value.parse().ok())
}
