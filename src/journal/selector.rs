//! Picks the line of NPC dialogue to speak from a journal

use super::{DialogueLine, LogEvent, NPC_NAME_MARKER};

const RECEIVE_TEXT: &str = "ReceiveText";
const NPC_CHANNEL: &str = "npc";

/// Is this event a message spoken by an NPC?
pub fn is_npc_dialogue(event: &LogEvent) -> bool {
    event.event_kind == RECEIVE_TEXT
        && event.channel == NPC_CHANNEL
        && event.sender.contains(NPC_NAME_MARKER)
}

/// The last NPC dialogue event in file order, if any
pub fn select_latest_dialogue<I>(events: I) -> Option<DialogueLine>
where
    I: IntoIterator<Item = LogEvent>,
{
    events
        .into_iter()
        .filter(is_npc_dialogue)
        .last()
        .map(|event| DialogueLine::from_event(&event))
}
