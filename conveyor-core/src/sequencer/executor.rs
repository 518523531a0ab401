//! Sequencer
//!
//! Owns the state machine together with the width axis, the belt motor and
//! the sensor fusion. Everything is driven from two entry points:
//!
//! - [`Sequencer::handle_command`] for each decoded command line
//! - [`Sequencer::tick`] once per control period with fresh sensor samples
//!
//! Both run to completion and push the resulting belt output to the motor
//! before returning. Status events accumulate in a bounded queue that the
//! caller drains with [`Sequencer::pop_status`].

use heapless::Deque;
use libm::roundf;

use conveyor_protocol::{parse, Command, CommandKind, StatusEvent};

use crate::config::ConveyorConfig;
use crate::motion::{AxisController, HomingPoll, MotionDriver, MoveError};
use crate::sensor::{RawReadings, SensorFusion, SensorSnapshot};
use crate::state::{Event, State};
use crate::timer::{Countdown, MAX_DURATION_MS};
use crate::traits::{Direction, LimitSwitch, StepperDriver, TransportMotor};

use super::leg::{Leg, LegGoal, LegStatus};

/// Status events kept before the oldest is dropped
pub const STATUS_QUEUE_LEN: usize = 16;

/// Sequencing steps taken per tick or command
const MAX_STEPS_PER_TICK: usize = 4;

/// Ready lines from neighbouring machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadySignals {
    /// Upstream has a board to hand over
    pub upstream_ready: bool,
    /// Downstream can accept a board
    pub downstream_ready: bool,
}

/// Inputs sampled each control tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlInputs {
    pub readings: RawReadings,
    pub ready: ReadySignals,
}

/// Ready lines we drive for neighbouring machines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeOutputs {
    /// We can take a board from upstream
    pub accepting_board: bool,
    /// We have a board for downstream
    pub board_available: bool,
}

/// Pauses beyond the longest countdown are capped
fn seconds_to_ms(seconds: f32) -> u32 {
    if seconds.is_finite() && seconds > 0.0 {
        (roundf(seconds * 1000.0) as u32).min(MAX_DURATION_MS)
    } else {
        0
    }
}

/// Conveyor sequencer
pub struct Sequencer<S, L, M> {
    config: ConveyorConfig,
    state: State,
    axis: AxisController<S, L>,
    motion: MotionDriver<M>,
    sensors: SensorFusion,
    snapshot: SensorSnapshot,
    ready: ReadySignals,
    active_command: Option<Command>,
    leg: Option<Leg>,
    dwell_timer: Countdown,
    pause_ms: u32,
    /// Buffer modes: a board at the entrance waits to be loaded
    pending_load: bool,
    /// Buffer modes: a release has been requested
    pending_unload: bool,
    motor_fault: bool,
    status: Deque<StatusEvent, STATUS_QUEUE_LEN>,
}

impl<S, L, M> Sequencer<S, L, M>
where
    S: StepperDriver,
    L: LimitSwitch,
    M: TransportMotor,
{
    /// Create a sequencer in the `Unhomed` state
    pub fn new(config: ConveyorConfig, stepper: S, limit: L, motor: M) -> Self {
        Self {
            config,
            state: State::Unhomed,
            axis: AxisController::new(config.axis, stepper, limit),
            motion: MotionDriver::new(config.speed, motor),
            sensors: SensorFusion::new(config.sensors, config.transport.flow),
            snapshot: SensorSnapshot::default(),
            ready: ReadySignals::default(),
            active_command: None,
            leg: None,
            dwell_timer: Countdown::new(),
            pause_ms: seconds_to_ms(config.timing.default_pause_s),
            pending_load: false,
            pending_unload: false,
            motor_fault: false,
            status: Deque::new(),
        }
    }

    /// Current operating mode
    pub fn state(&self) -> State {
        self.state
    }

    /// Width axis
    pub fn axis(&self) -> &AxisController<S, L> {
        &self.axis
    }

    /// Belt motor
    pub fn motion(&self) -> &MotionDriver<M> {
        &self.motion
    }

    /// Latest debounced sensor snapshot
    pub fn snapshot(&self) -> SensorSnapshot {
        self.snapshot
    }

    /// Command currently being carried out
    pub fn active_command(&self) -> Option<Command> {
        self.active_command
    }

    /// Pause used by the timed modes
    pub fn pause_ms(&self) -> u32 {
        self.pause_ms
    }

    /// Active configuration
    pub fn config(&self) -> &ConveyorConfig {
        &self.config
    }

    /// Take the oldest queued status event
    pub fn pop_status(&mut self) -> Option<StatusEvent> {
        self.status.pop_front()
    }

    /// Ready lines to drive for neighbouring machines
    pub fn handshake_outputs(&self) -> HandshakeOutputs {
        let idle_buffer = self.state.is_buffering() && self.leg.is_none();
        let board_on_belt = self.snapshot.board_on_belt();

        HandshakeOutputs {
            accepting_board: self.state == State::WaitingToLoad || (idle_buffer && !board_on_belt),
            board_available: self.state == State::WaitingToUnload || (idle_buffer && board_on_belt),
        }
    }

    /// Decode and handle one command line
    pub fn handle_line(&mut self, line: &str, now_ms: u32) -> Command {
        let command = parse(line);
        self.handle_command(command, now_ms);
        command
    }

    /// Handle a decoded command
    pub fn handle_command(&mut self, command: Command, now_ms: u32) {
        match command.kind {
            CommandKind::Unknown => self.report(StatusEvent::UnknownCommand),
            _ if self.state == State::Homing => self.report(StatusEvent::Busy),
            CommandKind::Home => self.begin_homing(command),
            CommandKind::MoveTo => self.move_axis(command),
            kind if kind.is_spindle() => self.spindle(command),
            _ => self.begin_transport(command, now_ms),
        }
        self.apply_motor();
    }

    /// Run one control period
    pub fn tick(&mut self, now_ms: u32, inputs: &ControlInputs) {
        self.snapshot = self.sensors.update(&inputs.readings);
        let prev_ready = self.ready;
        self.ready = inputs.ready;

        if self.state == State::Homing {
            self.poll_homing();
        } else {
            self.latch_buffer_triggers(prev_ready);
            self.advance(now_ms);
        }
        self.apply_motor();
    }

    fn begin_homing(&mut self, command: Command) {
        self.abort_sequence();
        self.axis.start_homing();
        self.active_command = Some(command);
        self.report(StatusEvent::HomingStarted);
        self.fire(Event::Home);
    }

    fn poll_homing(&mut self) {
        match self.axis.poll_homing() {
            Ok(HomingPoll::InProgress) => {}
            Ok(HomingPoll::Complete(position)) => {
                self.active_command = None;
                self.report(StatusEvent::HomingComplete { position });
                self.fire(Event::HomingComplete);
            }
            Err(_) => {
                self.active_command = None;
                self.report(StatusEvent::HomingFailed);
                self.fire(Event::HomingFailed);
            }
        }
    }

    fn move_axis(&mut self, command: Command) {
        if !self.axis.is_homed() {
            self.report(StatusEvent::NotHomed);
            return;
        }
        let Some(target) = command.position else {
            self.report(StatusEvent::MissingPosition);
            return;
        };
        let plan = match self.axis.plan_move(target) {
            Ok(plan) => plan,
            Err(e) => {
                self.report_move_error(e);
                return;
            }
        };

        self.abort_sequence();
        self.active_command = Some(command);
        self.fire(Event::MoveAccepted);
        self.report(StatusEvent::MoveStarted {
            current: plan.from,
            requested: plan.to,
            delta: plan.delta,
            steps: plan.steps,
        });

        match self.axis.move_to(target) {
            Ok(_) => self.report(StatusEvent::MoveComplete),
            Err(e) => self.report_move_error(e),
        }
        self.active_command = None;
        self.fire(Event::MoveFinished);
    }

    fn report_move_error(&mut self, error: MoveError) {
        let event = match error {
            MoveError::NotHomed => StatusEvent::NotHomed,
            MoveError::AboveMaximum => StatusEvent::PositionTooLarge {
                max: self.config.axis.max_position_mm,
            },
            MoveError::BelowMinimum => StatusEvent::PositionTooSmall {
                min: self.config.axis.min_position_mm,
            },
            MoveError::InvalidTarget => StatusEvent::MissingPosition,
            MoveError::Driver(_) => StatusEvent::MoveFailed,
        };
        self.report(event);
    }

    fn spindle(&mut self, command: Command) {
        self.abort_sequence();

        let (direction, status) = match command.kind {
            CommandKind::SpindleLeft => (Direction::Left, StatusEvent::ConveyorLeft),
            CommandKind::SpindleRight => (Direction::Right, StatusEvent::ConveyorRight),
            _ => (Direction::Stop, StatusEvent::ConveyorStop),
        };

        // Speed is validated before the direction takes effect. A stop only
        // touches the speed when it carries an S word.
        if direction != Direction::Stop || command.speed.is_some() {
            self.resolve_speed(&command);
        }
        self.motion.set_direction(direction);
        self.active_command = Some(command);
        self.report(status);
    }

    /// Apply the command's `S` word, or fall back to the prior/default speed
    fn resolve_speed(&mut self, command: &Command) -> u16 {
        match command.speed {
            Some(requested) => {
                let accepted = self.motion.set_speed(requested);
                if accepted != requested {
                    self.report(StatusEvent::SpeedRejected { requested });
                }
                accepted
            }
            None if self.motion.requested_speed() == 0 => {
                self.motion.set_speed(self.config.speed.default_speed)
            }
            None => self.motion.requested_speed(),
        }
    }

    fn begin_transport(&mut self, command: Command, now_ms: u32) {
        let Some(event) = Event::from_command(command.kind) else {
            self.report(StatusEvent::UnknownCommand);
            return;
        };

        self.clear_sequence();
        self.motion.stop();

        if self.resolve_speed(&command) == 0 {
            self.report(StatusEvent::NoSpeed);
            self.fire(Event::ManualOverride);
            return;
        }
        if let Some(pause) = command.pause.filter(|p| *p >= 0.0) {
            self.pause_ms = seconds_to_ms(pause);
        }

        self.active_command = Some(command);
        self.fire(event);

        match self.state {
            State::LoadingToMiddle => self.start_leg(LegGoal::Middle, now_ms),
            State::LoadingToEnd | State::MovingToEnd => self.start_leg(LegGoal::End, now_ms),
            State::UnloadingNow | State::UnloadingTimed { .. } => {
                self.start_leg(LegGoal::Depart, now_ms)
            }
            State::Buffering => {
                self.pending_load = self.snapshot.entrance_present;
            }
            State::BufferingTimed { .. } => {
                self.pending_load = self.snapshot.entrance_present;
                self.start_dwell(now_ms);
            }
            _ => {}
        }

        self.advance(now_ms);
    }

    fn start_leg(&mut self, goal: LegGoal, now_ms: u32) {
        let timeout_ms = goal.timeout_ms(&self.config.timing);
        self.leg = Some(Leg::start(goal, &self.snapshot, now_ms, timeout_ms));
        self.motion
            .set_direction(self.config.transport.flow.forward());
    }

    fn start_dwell(&mut self, now_ms: u32) {
        self.dwell_timer.arm(now_ms, self.pause_ms);
        self.report(StatusEvent::Dwelling {
            seconds: self.pause_ms as f32 / 1000.0,
        });
    }

    fn latch_buffer_triggers(&mut self, prev_ready: ReadySignals) {
        if !self.state.is_buffering() {
            return;
        }

        if self.sensors.edges().entrance_arrived {
            self.pending_load = true;
        }
        if !self.snapshot.entrance_present {
            self.pending_load = false;
        }
        if self.state == State::Buffering {
            if self.ready.downstream_ready && !prev_ready.downstream_ready {
                self.pending_unload = true;
            }
            // A release request lapses once downstream withdraws
            if !self.ready.downstream_ready {
                self.pending_unload = false;
            }
        }
    }

    fn advance(&mut self, now_ms: u32) {
        for _ in 0..MAX_STEPS_PER_TICK {
            if !self.step(now_ms) {
                break;
            }
        }
    }

    /// Take one sequencing step, returning whether anything changed
    fn step(&mut self, now_ms: u32) -> bool {
        if let Some(mut leg) = self.leg {
            let status = leg.update(&self.snapshot, now_ms, self.config.timing.runon_ms);
            if status == LegStatus::Running {
                self.leg = Some(leg);
                return false;
            }
            self.leg = None;
            self.finish_leg(leg.goal(), status == LegStatus::TimedOut, now_ms);
            return true;
        }

        match self.state {
            State::WaitingToLoad if self.ready.upstream_ready => {
                self.fire(Event::UpstreamReady);
                self.start_leg(LegGoal::Middle, now_ms);
                true
            }
            State::WaitingToUnload if self.ready.downstream_ready => {
                self.fire(Event::DownstreamReady);
                self.start_leg(LegGoal::Depart, now_ms);
                true
            }
            State::UnloadingTimed { dwelling: true } if self.dwell_timer.expired(now_ms) => {
                self.dwell_timer.cancel();
                self.fire(Event::DwellElapsed);
                self.start_leg(LegGoal::Depart, now_ms);
                true
            }
            State::BufferingTimed { dwelling: true } if self.dwell_timer.expired(now_ms) => {
                self.dwell_timer.cancel();
                self.fire(Event::DwellElapsed);
                self.pending_unload = true;
                true
            }
            State::Buffering | State::BufferingTimed { .. } => self.serve_buffer(now_ms),
            _ => false,
        }
    }

    /// Start a pending buffer leg; releases go first
    fn serve_buffer(&mut self, now_ms: u32) -> bool {
        let board_on_belt = self.snapshot.board_on_belt();

        if self.pending_unload && board_on_belt {
            self.pending_unload = false;
            self.start_leg(LegGoal::Depart, now_ms);
            return true;
        }
        if self.pending_load && !board_on_belt {
            self.pending_load = false;
            self.start_leg(LegGoal::Middle, now_ms);
            return true;
        }
        false
    }

    fn finish_leg(&mut self, goal: LegGoal, timed_out: bool, now_ms: u32) {
        self.motion.stop();

        let timing = self.config.timing;
        let status = match (goal, timed_out) {
            (LegGoal::Depart, true) => StatusEvent::UnloadTimeout {
                seconds: timing.unload_timeout_s,
            },
            (_, true) => StatusEvent::LoadTimeout {
                seconds: timing.load_timeout_s,
            },
            (LegGoal::Middle, false) => StatusEvent::BoardAtMiddle,
            (LegGoal::End, false) => StatusEvent::BoardAtEnd,
            (LegGoal::Depart, false) => StatusEvent::BoardUnloaded,
        };
        self.report(status);

        let event = if timed_out {
            Event::LegTimedOut
        } else {
            Event::LegComplete
        };

        match self.state {
            State::UnloadingTimed { .. } => {
                self.fire(event);
                self.start_dwell(now_ms);
            }
            State::Buffering => {
                // A level-held ready line never produces an edge
                if goal == LegGoal::Middle && !timed_out && self.ready.downstream_ready {
                    self.pending_unload = true;
                }
            }
            State::BufferingTimed { .. } => {
                if goal.is_unload() {
                    self.fire(Event::ReleaseFinished);
                    self.start_dwell(now_ms);
                }
            }
            _ => {
                self.active_command = None;
                self.fire(event);
            }
        }
    }

    /// Drop leg, timers and latched triggers
    fn clear_sequence(&mut self) {
        self.leg = None;
        self.dwell_timer.cancel();
        self.pending_load = false;
        self.pending_unload = false;
        self.active_command = None;
    }

    /// Cancel any transport sequence and stop the belt
    fn abort_sequence(&mut self) {
        self.clear_sequence();
        self.motion.stop();
        self.fire(Event::ManualOverride);
    }

    fn fire(&mut self, event: Event) {
        let next = self.state.transition(event, self.axis.is_homed());
        if next != self.state {
            self.report(StatusEvent::StateChanged {
                from: self.state.name(),
                to: next.name(),
            });
            self.state = next;
        }
    }

    fn apply_motor(&mut self) {
        match self.motion.apply() {
            Ok(_) => self.motor_fault = false,
            Err(_) => {
                if !self.motor_fault {
                    self.motor_fault = true;
                    self.report(StatusEvent::MotorFault);
                }
                self.abort_sequence();
            }
        }
    }

    fn report(&mut self, event: StatusEvent) {
        if self.status.is_full() {
            self.status.pop_front();
        }
        let _ = self.status.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::RangeReading;
    use crate::traits::{MotorError, MotorOutput, StepperError};
    use heapless::Vec;

    const BOARD: RangeReading = RangeReading::Distance(20);
    const EMPTY: RangeReading = RangeReading::Distance(120);

    #[derive(Default)]
    struct MockStepper {
        total: i32,
        last: Option<i32>,
    }

    impl StepperDriver for MockStepper {
        fn step(&mut self, steps: i32) -> Result<(), StepperError> {
            self.total += steps;
            self.last = Some(steps);
            Ok(())
        }
    }

    /// Switch that is either always or never asserted
    struct MockLimit(bool);

    impl LimitSwitch for MockLimit {
        fn is_triggered(&mut self) -> Result<bool, StepperError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct MockMotor {
        last: MotorOutput,
        fail: bool,
    }

    impl TransportMotor for MockMotor {
        fn drive(&mut self, output: MotorOutput) -> Result<(), MotorError> {
            if self.fail {
                return Err(MotorError::Pwm);
            }
            self.last = output;
            Ok(())
        }
    }

    type TestSequencer = Sequencer<MockStepper, MockLimit, MockMotor>;

    fn sequencer_with(limit_found: bool, motor_fails: bool) -> TestSequencer {
        Sequencer::new(
            ConveyorConfig::default(),
            MockStepper::default(),
            MockLimit(limit_found),
            MockMotor {
                fail: motor_fails,
                ..MockMotor::default()
            },
        )
    }

    fn sequencer() -> TestSequencer {
        sequencer_with(true, false)
    }

    fn homed() -> TestSequencer {
        let mut seq = sequencer();
        seq.handle_line("G28", 0);
        seq.tick(0, &inputs(false, false, false));
        drain(&mut seq);
        seq
    }

    fn inputs(entrance: bool, middle: bool, exit: bool) -> ControlInputs {
        let sample = |present| if present { BOARD } else { EMPTY };
        ControlInputs {
            readings: RawReadings {
                left: sample(entrance),
                middle: sample(middle),
                right: sample(exit),
            },
            ready: ReadySignals::default(),
        }
    }

    fn with_ready(mut inputs: ControlInputs, upstream: bool, downstream: bool) -> ControlInputs {
        inputs.ready = ReadySignals {
            upstream_ready: upstream,
            downstream_ready: downstream,
        };
        inputs
    }

    fn drain(seq: &mut TestSequencer) -> Vec<StatusEvent, 32> {
        let mut out = Vec::new();
        while let Some(event) = seq.pop_status() {
            let _ = out.push(event);
        }
        out
    }

    fn motor(seq: &TestSequencer) -> MotorOutput {
        seq.motion().motor().last
    }

    /// Tick with the exit empty until its debounce clears
    fn clear_exit(seq: &mut TestSequencer, start_ms: u32) -> u32 {
        let mut now = start_ms;
        for _ in 0..10 {
            now += 100;
            seq.tick(now, &inputs(false, false, false));
        }
        now
    }

    #[test]
    fn test_starts_unhomed() {
        let seq = sequencer();
        assert_eq!(seq.state(), State::Unhomed);
        assert!(!seq.axis().is_homed());
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_move_before_homing_rejected() {
        let mut seq = sequencer();
        seq.handle_line("G0 Y100", 0);

        assert_eq!(drain(&mut seq).as_slice(), &[StatusEvent::NotHomed]);
        assert_eq!(seq.state(), State::Unhomed);
        assert_eq!(seq.axis().stepper().last, None);
    }

    #[test]
    fn test_home_then_move() {
        let mut seq = sequencer();

        seq.handle_line("G28", 0);
        assert_eq!(seq.state(), State::Homing);

        seq.tick(100, &inputs(false, false, false));
        assert_eq!(seq.state(), State::Idle);
        assert!(seq.axis().is_homed());
        assert_eq!(seq.axis().position(), 297.0);
        let events = drain(&mut seq);
        assert_eq!(events[0], StatusEvent::HomingStarted);
        assert!(events.contains(&StatusEvent::HomingComplete { position: 297.0 }));

        seq.handle_line("G0 Y100", 200);
        let expected_steps = roundf((100.0 - 297.0) * 39.47) as i32;
        assert_eq!(seq.axis().position(), 100.0);
        assert_eq!(seq.axis().stepper().last, Some(expected_steps));
        assert_eq!(seq.state(), State::Idle);

        let events = drain(&mut seq);
        assert!(events.contains(&StatusEvent::MoveComplete));
        assert!(events.iter().any(|e| matches!(
            e,
            StatusEvent::MoveStarted { steps, .. } if *steps == expected_steps
        )));
    }

    #[test]
    fn test_move_out_of_bounds() {
        let mut seq = homed();

        seq.handle_line("G0 Y400", 0);
        seq.handle_line("G0 Y10", 0);

        assert_eq!(
            drain(&mut seq).as_slice(),
            &[
                StatusEvent::PositionTooLarge { max: 300.0 },
                StatusEvent::PositionTooSmall { min: 45.0 },
            ]
        );
        assert_eq!(seq.axis().position(), 297.0);
        assert_eq!(seq.state(), State::Idle);
    }

    #[test]
    fn test_move_without_position_stays_put() {
        let mut seq = homed();
        seq.handle_line("G0", 0);

        assert_eq!(drain(&mut seq).as_slice(), &[StatusEvent::MissingPosition]);
        assert_eq!(seq.axis().position(), 297.0);
    }

    #[test]
    fn test_commands_rejected_while_homing() {
        let mut seq = sequencer_with(false, false);
        seq.handle_line("G28", 0);
        drain(&mut seq);

        seq.handle_line("M3 S800", 0);
        seq.handle_line("G28", 0);
        assert_eq!(
            drain(&mut seq).as_slice(),
            &[StatusEvent::Busy, StatusEvent::Busy]
        );
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_homing_failure() {
        let mut seq = sequencer_with(false, false);
        seq.handle_line("G28", 0);

        let mut now = 0;
        while seq.state() == State::Homing && now < 1_000_000 {
            now += 100;
            seq.tick(now, &inputs(false, false, false));
        }

        assert_eq!(seq.state(), State::Unhomed);
        assert!(drain(&mut seq).contains(&StatusEvent::HomingFailed));
    }

    #[test]
    fn test_load_to_middle() {
        let mut seq = homed();

        seq.handle_line("M50 S800", 0);
        assert_eq!(seq.state(), State::LoadingToMiddle);
        assert!(motor(&seq).is_running());
        assert_eq!(motor(&seq).direction, Direction::Right);

        seq.tick(100, &inputs(true, false, false));
        assert_eq!(seq.state(), State::LoadingToMiddle);

        seq.tick(200, &inputs(false, true, false));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(drain(&mut seq).contains(&StatusEvent::BoardAtMiddle));
    }

    #[test]
    fn test_load_timeout() {
        let mut seq = homed();
        seq.handle_line("M50 S800", 0);

        seq.tick(29_999, &inputs(false, false, false));
        assert_eq!(seq.state(), State::LoadingToMiddle);

        seq.tick(30_000, &inputs(false, false, false));
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(drain(&mut seq).contains(&StatusEvent::LoadTimeout { seconds: 30 }));
    }

    #[test]
    fn test_unknown_command_ignored() {
        let mut seq = homed();
        seq.handle_line("M3 S900", 0);
        drain(&mut seq);
        let before = motor(&seq);

        seq.handle_line("G99", 0);

        assert_eq!(drain(&mut seq).as_slice(), &[StatusEvent::UnknownCommand]);
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), before);
    }

    #[test]
    fn test_spindle_commands() {
        let mut seq = homed();

        seq.handle_line("M3 S700", 0);
        assert_eq!(motor(&seq).direction, Direction::Right);

        seq.handle_line("M4", 0);
        assert_eq!(motor(&seq).direction, Direction::Left);
        assert_eq!(seq.motion().requested_speed(), 700);

        seq.handle_line("M5", 0);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_stop_applies_speed_word() {
        let mut seq = homed();
        seq.handle_line("M3 S800", 0);

        seq.handle_line("M5", 0);
        assert_eq!(seq.motion().requested_speed(), 800);

        seq.handle_line("M5 S0", 0);
        assert_eq!(seq.motion().requested_speed(), 0);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);

        seq.handle_line("M5 S900", 0);
        assert_eq!(seq.motion().requested_speed(), 900);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_invalid_speed_stops_belt() {
        let mut seq = homed();
        seq.handle_line("M3 S5000", 0);

        assert_eq!(seq.motion().requested_speed(), 0);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(drain(&mut seq).contains(&StatusEvent::SpeedRejected { requested: 5000 }));
    }

    #[test]
    fn test_transport_with_zero_speed_refused() {
        let mut seq = homed();
        seq.handle_line("M50 S0", 0);

        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(drain(&mut seq).contains(&StatusEvent::NoSpeed));
    }

    #[test]
    fn test_transport_uses_default_speed() {
        let mut seq = homed();
        seq.handle_line("M50", 0);

        assert_eq!(seq.motion().requested_speed(), 1200);
        assert!(motor(&seq).is_running());
    }

    #[test]
    fn test_transport_allowed_before_homing() {
        let mut seq = sequencer();
        seq.handle_line("M52 S900", 0);
        assert_eq!(seq.state(), State::LoadingToEnd);

        seq.tick(100, &inputs(false, false, true));
        assert_eq!(seq.state(), State::Unhomed);
        assert!(drain(&mut seq).contains(&StatusEvent::BoardAtEnd));
    }

    #[test]
    fn test_move_to_end_with_board_already_there() {
        let mut seq = homed();
        seq.tick(0, &inputs(false, false, true));

        seq.handle_line("M53 S900", 0);
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_unload_now() {
        let mut seq = homed();
        seq.tick(0, &inputs(false, true, false));

        seq.handle_line("M54 S900", 0);
        assert_eq!(seq.state(), State::UnloadingNow);
        assert!(motor(&seq).is_running());

        seq.tick(100, &inputs(false, false, true));
        assert_eq!(seq.state(), State::UnloadingNow);

        // Exit must clear through the full debounce
        for i in 0..9 {
            seq.tick(200 + i * 100, &inputs(false, false, false));
            assert_eq!(seq.state(), State::UnloadingNow);
        }
        seq.tick(1_100, &inputs(false, false, false));

        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(drain(&mut seq).contains(&StatusEvent::BoardUnloaded));
    }

    #[test]
    fn test_unload_run_on() {
        let mut config = ConveyorConfig::default();
        config.timing.runon_ms = 500;
        let mut seq = Sequencer::new(
            config,
            MockStepper::default(),
            MockLimit(true),
            MockMotor::default(),
        );
        seq.tick(0, &inputs(false, false, true));

        seq.handle_line("M54 S900", 0);
        let now = clear_exit(&mut seq, 0);
        assert_eq!(seq.state(), State::UnloadingNow);
        assert!(motor(&seq).is_running());

        seq.tick(now + 500, &inputs(false, false, false));
        assert_eq!(seq.state(), State::Unhomed);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_timed_unload_dwells_after_unload() {
        let mut seq = homed();
        seq.tick(0, &inputs(false, false, true));

        seq.handle_line("M56 S900 P2", 0);
        assert_eq!(seq.state(), State::UnloadingTimed { dwelling: false });
        assert_eq!(seq.pause_ms(), 2_000);

        let now = clear_exit(&mut seq, 0);
        assert_eq!(seq.state(), State::UnloadingTimed { dwelling: true });
        assert_eq!(motor(&seq), MotorOutput::STOPPED);

        // Dwell counts from the end of the unload
        seq.tick(now + 1_999, &inputs(false, false, false));
        assert_eq!(seq.state(), State::UnloadingTimed { dwelling: true });

        seq.tick(now + 2_000, &inputs(false, false, false));
        assert_eq!(seq.state(), State::UnloadingTimed { dwelling: false });
        assert!(motor(&seq).is_running());
    }

    #[test]
    fn test_timed_unload_continues_after_timeout() {
        let mut seq = homed();
        seq.handle_line("M56 S900 P1", 0);

        seq.tick(30_000, &inputs(false, false, false));
        assert_eq!(seq.state(), State::UnloadingTimed { dwelling: true });
        assert!(drain(&mut seq).contains(&StatusEvent::UnloadTimeout { seconds: 30 }));

        seq.tick(31_000, &inputs(false, false, false));
        assert_eq!(seq.state(), State::UnloadingTimed { dwelling: false });
    }

    #[test]
    fn test_load_waits_for_upstream() {
        let mut seq = homed();
        seq.handle_line("M51 S800", 0);

        assert_eq!(seq.state(), State::WaitingToLoad);
        assert!(seq.handshake_outputs().accepting_board);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);

        seq.tick(100, &with_ready(inputs(false, false, false), true, false));
        assert_eq!(seq.state(), State::LoadingToMiddle);
        assert!(motor(&seq).is_running());
        assert!(!seq.handshake_outputs().accepting_board);
    }

    #[test]
    fn test_unload_waits_for_downstream() {
        let mut seq = homed();
        seq.tick(0, &inputs(false, true, false));
        seq.handle_line("M55 S800", 0);

        assert_eq!(seq.state(), State::WaitingToUnload);
        assert!(seq.handshake_outputs().board_available);

        seq.tick(100, &with_ready(inputs(false, true, false), false, true));
        assert_eq!(seq.state(), State::UnloadingNow);
    }

    #[test]
    fn test_buffer_cycle() {
        let mut seq = sequencer();
        seq.handle_line("M57 S800", 0);
        assert_eq!(seq.state(), State::Buffering);
        assert!(seq.handshake_outputs().accepting_board);

        // Board arrives at the entrance and is loaded
        seq.tick(100, &inputs(true, false, false));
        assert!(motor(&seq).is_running());

        seq.tick(200, &inputs(true, true, false));
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert_eq!(seq.state(), State::Buffering);
        assert!(seq.handshake_outputs().board_available);

        // Downstream becomes ready: release it
        seq.tick(300, &with_ready(inputs(false, true, false), false, true));
        assert!(motor(&seq).is_running());
        assert!(!seq.handshake_outputs().board_available);

        seq.tick(400, &with_ready(inputs(false, false, true), false, true));
        clear_exit(&mut seq, 400);
        assert_eq!(seq.state(), State::Buffering);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(drain(&mut seq).contains(&StatusEvent::BoardUnloaded));
    }

    #[test]
    fn test_buffer_ignores_withdrawn_downstream_ready() {
        let mut seq = sequencer();
        seq.handle_line("M57 S800", 0);

        // Downstream pulses ready while the belt is empty
        seq.tick(100, &with_ready(inputs(false, false, false), false, true));
        seq.tick(200, &inputs(false, false, false));

        // A board loads and parks at the middle
        seq.tick(300, &inputs(true, false, false));
        assert!(motor(&seq).is_running());
        seq.tick(400, &inputs(true, true, false));
        seq.tick(500, &inputs(false, true, false));

        assert_eq!(seq.state(), State::Buffering);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(seq.handshake_outputs().board_available);
        assert!(!drain(&mut seq).contains(&StatusEvent::BoardUnloaded));

        // A fresh ready edge releases it
        seq.tick(600, &with_ready(inputs(false, true, false), false, true));
        assert!(motor(&seq).is_running());
    }

    #[test]
    fn test_buffer_holds_entrance_while_occupied() {
        let mut seq = sequencer();
        seq.tick(0, &inputs(false, true, false));
        seq.handle_line("M57 S800", 0);

        // Middle occupied: entrance board waits
        seq.tick(100, &inputs(true, true, false));
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
        assert!(!seq.handshake_outputs().accepting_board);
    }

    #[test]
    fn test_timed_buffer_releases_after_pause() {
        let mut seq = sequencer();
        seq.tick(0, &inputs(false, true, false));

        seq.handle_line("M58 S800 P1", 0);
        assert_eq!(seq.state(), State::BufferingTimed { dwelling: true });
        assert_eq!(motor(&seq), MotorOutput::STOPPED);

        seq.tick(1_000, &inputs(false, true, false));
        assert_eq!(seq.state(), State::BufferingTimed { dwelling: false });
        assert!(motor(&seq).is_running());

        seq.tick(1_100, &inputs(false, false, true));
        let now = clear_exit(&mut seq, 1_100);
        assert_eq!(seq.state(), State::BufferingTimed { dwelling: true });
        assert_eq!(motor(&seq), MotorOutput::STOPPED);

        // Next release is one pause after the previous one ended
        seq.tick(now + 999, &inputs(false, false, false));
        assert_eq!(seq.state(), State::BufferingTimed { dwelling: true });
    }

    #[test]
    fn test_very_long_pause_is_capped() {
        let mut seq = sequencer();
        seq.tick(0, &inputs(false, true, false));

        seq.handle_line("M58 S800 P3000000", 0);
        assert_eq!(seq.pause_ms(), MAX_DURATION_MS);
        assert_eq!(seq.state(), State::BufferingTimed { dwelling: true });

        seq.tick(50, &inputs(false, true, false));
        assert_eq!(seq.state(), State::BufferingTimed { dwelling: true });
        assert_eq!(motor(&seq), MotorOutput::STOPPED);
    }

    #[test]
    fn test_spindle_cancels_sequence() {
        let mut seq = homed();
        seq.handle_line("M50 S800", 0);
        assert_eq!(seq.state(), State::LoadingToMiddle);

        seq.handle_line("M5", 0);
        assert_eq!(seq.state(), State::Idle);
        assert_eq!(motor(&seq), MotorOutput::STOPPED);

        // Leg is gone: sensors no longer matter
        seq.tick(30_000, &inputs(false, false, false));
        assert!(!drain(&mut seq).contains(&StatusEvent::LoadTimeout { seconds: 30 }));
    }

    #[test]
    fn test_new_command_supersedes_sequence() {
        let mut seq = homed();
        seq.handle_line("M57 S800", 0);
        seq.handle_line("M50", 0);

        assert_eq!(seq.state(), State::LoadingToMiddle);
        assert_eq!(seq.motion().requested_speed(), 800);
    }

    #[test]
    fn test_status_queue_drops_oldest() {
        let mut seq = sequencer();
        for _ in 0..STATUS_QUEUE_LEN {
            seq.handle_line("G99", 0);
        }
        seq.handle_line("G0 Y100", 0);

        let events = drain(&mut seq);
        assert_eq!(events.len(), STATUS_QUEUE_LEN);
        assert_eq!(events.last(), Some(&StatusEvent::NotHomed));
    }

    #[test]
    fn test_motor_fault_reported_once() {
        let mut seq = sequencer_with(true, true);
        seq.handle_line("M50 S800", 0);
        seq.tick(100, &inputs(false, false, false));
        seq.tick(200, &inputs(false, false, false));

        let events = drain(&mut seq);
        let faults = events
            .iter()
            .filter(|e| **e == StatusEvent::MotorFault)
            .count();
        assert_eq!(faults, 1);
        assert_eq!(seq.state(), State::Unhomed);
    }
}
