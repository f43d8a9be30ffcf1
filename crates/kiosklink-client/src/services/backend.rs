//! Backend channel commands.

use kiosklink_core::protocol::backend::{BackendCommand, BackendMessage, SetScene};

use crate::channel::BackendChannel;
use crate::dispatch::Subscription;

impl BackendChannel {
    /// Send one UI event. `false` if the channel is not open.
    pub fn send(&self, command: BackendCommand) -> bool {
        self.send_command(command.name(), command.payload())
    }

    /// Scene changes only.
    pub fn on_set_scene<F>(&self, f: F) -> Subscription
    where
        F: Fn(&SetScene) + Send + Sync + 'static,
    {
        self.add_message_listener(move |env| {
            if let BackendMessage::SetScene(scene) = &env.data {
                f(scene);
            }
        })
    }
}
