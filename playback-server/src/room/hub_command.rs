use crate::signaling::Outbox;
use playback_core::{ClientMessage, ConnId, RoomId};
use tokio::sync::oneshot;

/// События, поступающие в хаб от WebSocket-соединений. Хаб обрабатывает их строго по одному.
#[derive(Debug)]
pub enum HubCommand {
    /// Новое соединение: зарегистрировать исходящую очередь и отправить приветствие.
    Connect { conn_id: ConnId, outbox: Outbox },

    /// Разобранный и провалидированный конверт от клиента.
    Message {
        conn_id: ConnId,
        message: ClientMessage,
    },

    /// Сигнал о разрыве WebSocket соединения.
    Disconnect { conn_id: ConnId },

    /// Снимок состава комнаты (для HTTP и тестов).
    MembersOf {
        room_id: RoomId,
        reply: oneshot::Sender<Vec<ConnId>>,
    },
}
