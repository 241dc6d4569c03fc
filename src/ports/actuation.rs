use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use super::RobotActuator;
use crate::error::AppError;
use crate::geo::Coordinate;

/// Logs commands instead of sending them to a fleet backend.
#[derive(Debug, Default, Clone)]
pub struct LoggingActuator;

#[async_trait]
impl RobotActuator for LoggingActuator {
    async fn navigate_to(&self, robot_id: Uuid, destination: Coordinate) -> Result<(), AppError> {
        info!(robot_id = %robot_id, destination = %destination, "navigate command issued");
        Ok(())
    }

    async fn open_door(&self, robot_id: Uuid) -> Result<(), AppError> {
        info!(robot_id = %robot_id, "open door command issued");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    NavigateTo {
        robot_id: Uuid,
        destination: Coordinate,
    },
    OpenDoor {
        robot_id: Uuid,
    },
}

/// Keeps every issued command in order.
#[derive(Debug, Default)]
pub struct RecordingActuator {
    commands: Mutex<Vec<RobotCommand>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn commands(&self) -> Vec<RobotCommand> {
        self.commands.lock().await.clone()
    }

    async fn push(&self, command: RobotCommand) {
        self.commands.lock().await.push(command);
    }
}

#[async_trait]
impl RobotActuator for RecordingActuator {
    async fn navigate_to(&self, robot_id: Uuid, destination: Coordinate) -> Result<(), AppError> {
        self.push(RobotCommand::NavigateTo {
            robot_id,
            destination,
        })
        .await;
        Ok(())
    }

    async fn open_door(&self, robot_id: Uuid) -> Result<(), AppError> {
        self.push(RobotCommand::OpenDoor { robot_id }).await;
        Ok(())
    }
}
