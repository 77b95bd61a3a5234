// Module naming follows project convention (Core = shared services, Dispatch = messages and processors)
#[allow(non_snake_case)]
pub mod Core {
    pub mod error;
    pub mod reply;
    pub mod uid;
    pub use error::{DispatchError, DispatchResult, ErrorKind};
    pub use reply::{InlineContext, QueuedContext, ReplyContext, ReplyDispatcher, ReplyJob};
    pub use uid::{UidGenerator, DEFAULT_UID_FLOOR};
}
#[allow(non_snake_case)]
pub mod Dispatch {
    pub mod Message {
        pub mod message;
        pub mod message_impl;
        pub use message::{Message, MessageBuilder, ReplyCallback}; // re-export for stable path
    }
    pub mod Processor {
        mod debug;
        mod getters;
        pub mod processor;
        mod worker;
        pub use processor::{Processor, ProcessorStats}; // re-export for stable path
    }
    pub mod Structs {
        pub mod Message_Structs;
        pub use Message_Structs::{Lane, MessageState, ProcessorState, Timestamps, TIME_UNSET};
    }
    pub mod builder;
    pub mod policy;
}
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub use Core::{
    DispatchError, DispatchResult, ErrorKind, InlineContext, QueuedContext, ReplyContext,
    ReplyDispatcher, UidGenerator,
};
pub use Dispatch::builder::{ProcessorBuilder, ProcessorConfig};
pub use Dispatch::policy::{
    BatchLimit, CoalesceByCode, MessageHandler, MessageQueue, Selection, SelectionPolicy, TakeAll,
};
pub use Dispatch::Message::{Message, MessageBuilder};
pub use Dispatch::Processor::{Processor, ProcessorStats};
pub use Dispatch::Structs::{Lane, MessageState, ProcessorState, Timestamps};
