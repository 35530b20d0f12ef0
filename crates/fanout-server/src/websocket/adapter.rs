//! Axum `Message` <-> hub `Frame` mapping.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use fanout_hub::{Frame, Payload};
use futures::{Sink, SinkExt, Stream, StreamExt, future};

/// Map an inbound socket message to a frame.
pub fn message_to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Message(Payload::Text(Arc::from(text.as_str()))),
        Message::Binary(data) => Frame::Message(Payload::Binary(data)),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(_) => Frame::Close,
    }
}

/// Map an outbound frame to a socket message.
pub fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Message(Payload::Text(text)) => Message::Text(text.as_ref().into()),
        Frame::Message(Payload::Binary(data)) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close => Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        })),
    }
}

/// Split an upgraded socket into the halves the pumps drive.
pub fn split_socket(
    socket: WebSocket,
) -> (
    impl Sink<Frame, Error = axum::Error> + Unpin + Send + 'static,
    impl Stream<Item = Result<Frame, axum::Error>> + Unpin + Send + 'static,
) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(frame_to_message(frame))));
    let stream = stream.map(|message| message.map(message_to_frame));
    (sink, stream)
}
