//! `FleetActor`: transport-facing wrapper around the `FleetRegistry`
//!
//! Serializes registration and control calls from the HTTP layer and the
//! poll loop onto one mailbox. A fleet poll only snapshots the device list
//! on the mailbox and awaits the devices on its own task.

use std::sync::Arc;
use std::time::Duration;

use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tokio::sync::broadcast;
use tracing::info;

use minefleet_api::{FleetEvent, StatsSnapshot};

use crate::config::FleetSettings;
use crate::deps::DeviceFactory;
use crate::error::CoreError;
use crate::message::{
    BasicSnapshot, CheckLight, CheckPause, DeviceStatus, LightDevice, ListDevices, PauseDevice,
    PollFleet, RegisterDevice, StartLifecycles, UnlightDevice, UnpauseDevice,
};
use crate::registry::FleetRegistry;

/// Arguments for spawning a `FleetActor`
pub struct FleetActorArgs {
    /// Settings shared by every device
    pub settings: Arc<FleetSettings>,
    /// Factory for creating device dependencies
    pub factory: Arc<dyn DeviceFactory>,
    /// Event broadcast sender
    pub event_tx: broadcast::Sender<FleetEvent>,
    /// Per-device bound inside a poll
    pub poll_timeout: Duration,
}

/// Fleet actor owning the registry
pub struct FleetActor {
    registry: FleetRegistry,
}

impl Actor for FleetActor {
    type Args = FleetActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        info!(id = %actor_ref.id(), "FleetActor starting");

        Ok(Self {
            registry: FleetRegistry::new(
                args.settings,
                args.factory,
                args.event_tx,
                args.poll_timeout,
            ),
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        info!(
            devices = self.registry.len(),
            reason = ?reason,
            "FleetActor stopping"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<RegisterDevice> for FleetActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: RegisterDevice,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.registry.register(msg.config).await.map(|_| ())
    }
}

impl Message<PollFleet> for FleetActor {
    type Reply = DelegatedReply<Vec<StatsSnapshot>>;

    /// The fan-out runs off the mailbox so control calls answer while it waits
    async fn handle(&mut self, _msg: PollFleet, ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        let poll = self.registry.poll();
        ctx.spawn(async move { poll.await.miners })
    }
}

impl Message<BasicSnapshot> for FleetActor {
    type Reply = Vec<StatsSnapshot>;

    async fn handle(
        &mut self,
        _msg: BasicSnapshot,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.registry.basic_snapshot().miners
    }
}

impl Message<StartLifecycles> for FleetActor {
    type Reply = usize;

    async fn handle(
        &mut self,
        _msg: StartLifecycles,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.registry.run_lifecycles().len()
    }
}

impl Message<PauseDevice> for FleetActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: PauseDevice, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.registry.pause(&msg.address)
    }
}

impl Message<UnpauseDevice> for FleetActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: UnpauseDevice,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.registry.unpause(&msg.address)
    }
}

impl Message<CheckPause> for FleetActor {
    type Reply = Result<bool, CoreError>;

    async fn handle(&mut self, msg: CheckPause, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.registry.check_pause(&msg.address)
    }
}

impl Message<LightDevice> for FleetActor {
    type Reply = Result<(), CoreError>;

    async fn handle(&mut self, msg: LightDevice, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.registry.light(&msg.address)
    }
}

impl Message<UnlightDevice> for FleetActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: UnlightDevice,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.registry.unlight(&msg.address)
    }
}

impl Message<CheckLight> for FleetActor {
    type Reply = Result<bool, CoreError>;

    async fn handle(&mut self, msg: CheckLight, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        self.registry.check_light(&msg.address)
    }
}

impl Message<ListDevices> for FleetActor {
    type Reply = Vec<DeviceStatus>;

    async fn handle(
        &mut self,
        _msg: ListDevices,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        self.registry.statuses().await
    }
}
