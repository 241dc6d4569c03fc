//! Reactions that let one aggregate's events drive the next operation.
//!
//! Each reaction is its own unit of work. A referent that disappeared in the
//! meantime is logged and skipped; it never fails the loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::dispatcher::{Dispatcher, Release};
use crate::error::AppError;
use crate::models::event::{DomainEvent, EventPayload};

pub async fn run_event_loop(
    dispatcher: Arc<Dispatcher>,
    mut event_rx: mpsc::UnboundedReceiver<DomainEvent>,
) {
    info!("event loop started");

    while let Some(event) = event_rx.recv().await {
        if let Err(err) = handle_event(&dispatcher, &event).await {
            error!(event = event.kind(), aggregate_id = %event.aggregate_id(), error = %err, "event handler failed");
        }
    }

    warn!("event loop stopped: handler queue closed");
}

pub async fn handle_event(dispatcher: &Dispatcher, event: &DomainEvent) -> Result<(), AppError> {
    match react(dispatcher, &event.payload).await {
        Err(err) if err.is_not_found() => {
            info!(event = event.kind(), error = %err, "referent gone; event skipped");
            Ok(())
        }
        other => other,
    }
}

async fn react(dispatcher: &Dispatcher, payload: &EventPayload) -> Result<(), AppError> {
    match payload {
        EventPayload::DeliveryCreated { delivery_id, .. } => {
            dispatcher.assign_robot_to_delivery(*delivery_id).await?;
        }
        EventPayload::RobotBecameAvailable { robot_id } => {
            dispatcher.assign_delivery_to_robot(*robot_id).await?;
        }
        EventPayload::RobotDestinationChanged {
            robot_id,
            destination,
            ..
        } => {
            dispatcher.issue_navigation(*robot_id, *destination).await;
        }
        EventPayload::RobotApproaching {
            robot_id,
            delivery_id: Some(delivery_id),
            ..
        } => {
            dispatcher.mark_approaching(*delivery_id, *robot_id).await?;
        }
        EventPayload::RobotArrived {
            robot_id,
            delivery_id: Some(delivery_id),
            ..
        } => {
            dispatcher.mark_arrived(*delivery_id, *robot_id).await?;
        }
        EventPayload::DeliveryStarted {
            delivery_id,
            robot_id: Some(robot_id),
        }
        | EventPayload::DeliveryReturnStarted {
            delivery_id,
            robot_id: Some(robot_id),
        } => {
            dispatcher.navigate_robot(*robot_id, *delivery_id).await?;
        }
        EventPayload::DeliveryCompleted {
            delivery_id,
            robot_id: Some(robot_id),
        }
        | EventPayload::DeliveryReturnCompleted {
            delivery_id,
            robot_id: Some(robot_id),
        } => {
            dispatcher
                .release_robot(*robot_id, *delivery_id, Release::Completed)
                .await?;
        }
        EventPayload::DeliveryCanceled {
            delivery_id,
            robot_id: Some(robot_id),
            requires_return: false,
        }
        | EventPayload::DeliveryRobotUnassigned {
            delivery_id,
            robot_id,
        }
        | EventPayload::DeliveryRobotReassigned {
            delivery_id,
            previous_robot_id: robot_id,
            ..
        } => {
            dispatcher
                .release_robot(*robot_id, *delivery_id, Release::Unassigned)
                .await?;
        }
        _ => {}
    }

    Ok(())
}
