pub mod event;

pub use event::{
    merge_update, normalize_create_input, Event, EventCreateInput, EventPatch, EventStatus,
    EventUpdateInput, Field, NewEvent,
};
