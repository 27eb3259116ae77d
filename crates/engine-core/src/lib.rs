pub mod clock;
pub mod control_loop;
pub mod derate;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod fault;
pub mod frame;
pub mod hal;
pub mod params;
pub mod tags;

pub use clock::{Clock, SimClock, WallClock};
pub use control_loop::{
    ConstantThrottle, LoopConfig, RunOutcome, RunSinks, RunStats, SimulationLoop, SineThrottle,
    ThrottleProfile,
};
pub use derate::{DerateController, DerateState, DerateUpdate};
pub use diagnostics::{
    DiagnosticSink, DtcCode, DtcRecord, EventCode, EventRecord, MemorySink, NullSink, Record,
};
pub use engine::{
    Advisory, EngineModel, EngineState, EngineStatus, SensorReading, StepReport, Tick,
};
pub use error::{EngineError, ParamsError, SinkError};
pub use fault::{FaultInjector, InjectedFault, RandomFaultInjector};
pub use frame::{encode_frame, SensorFrame, FRAME_ID, FRAME_LEN};
pub use hal::{DataRecord, DataSink, Discard, FrameSink, Tee};
pub use params::{EngineParams, EngineType};
