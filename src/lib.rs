// Crate entry point. Declares the module tree so the binary and tests can import it.
//
// Responsibilities
// - Only declare and expose modules. No business logic here.

pub mod shared {
    pub mod core {
        pub mod primitives;
    }
    pub mod infrastructure {
        pub mod entry_store;
    }
}

pub mod modules {
    pub mod time_log {
        pub mod core {
            pub mod aggregates;
            pub mod entry;
            pub mod events;
            pub mod stats;
            pub mod sync;
            pub mod undo;
        }
        pub mod application {
            pub mod config;
            pub mod errors;
            pub mod executor {
                pub mod command;
                pub mod worker;
            }
            pub mod history;
        }
        pub mod adapters {
            pub mod inbound {
                pub mod http;
            }
        }
    }
}

pub mod shell;
