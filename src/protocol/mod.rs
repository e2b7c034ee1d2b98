//! Line-Oriented Text Protocol
//!
//! One command per `\n`-terminated line in, one Redis-flavored reply out:
//!
//! ```text
//! SET name pavan        ->  +OK
//! GET name              ->  $5\r\npavan
//! GET missing           ->  $-1
//! DEL name              ->  :1
//! EXPIRE name 5000      ->  :1
//! PING                  ->  +PONG
//! QUIT                  ->  +Goodbye
//! ```

pub mod command;
pub mod response;

pub use command::{Command, CommandError};
pub use response::Response;
