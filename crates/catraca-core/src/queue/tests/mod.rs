use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::HandlerError;
use crate::store::{MemoryStore, ScoredMember, Store};
use crate::time::unix_ms;

use super::*;

use common::*;

mod common;
mod enqueue;
