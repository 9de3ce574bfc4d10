mod actor;
mod platform;
mod trigger;

pub use actor::{
    Actor, ActorBody, ActorContext, ActorFactory, ActorHandle, ActorMessage, ActorRegistry,
    ActorSpawn, ActorStatus, TileActor,
};
pub use platform::{ObjectWithPath, PlatformConfig, PlatformState, PlatformStep, PlatformTile};
pub use trigger::{
    CameraPan, Trigger, TriggerConfig, TriggerSound, TriggerState, Triggered, TriggeredAction,
    TriggeredConfig, PAN_SLEEP_TICKS, PAN_STEPS,
};

pub(crate) use platform::update_platform;
pub(crate) use trigger::{execute_triggered, fire_trigger};
