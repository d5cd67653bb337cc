//! Whiteboard and battle engine for the arcade rooms.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns the
//! full lifecycle of the canvas: translating raw DOM input into strokes,
//! keeping camera state for pan, merging remote room state, running the
//! battle simulation, and rendering both scenes. The host layer is responsible
//! only for wiring DOM events to the engine and dispatching the resulting
//! [`engine::Action`]s to the realtime channel.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine, testable [`engine::EngineCore`], and [`engine::Action`] |
//! | [`whiteboard`] | Drawing, pan, undo/redo, cursors, verification view |
//! | [`battle`] | Enemy/player/projectile simulation and remote reconciliation |
//! | [`doc`] | Stroke types and the in-memory stroke store |
//! | [`sync`] | Room paths, write disciplines, sync ops and their guard |
//! | [`records`] | Wire records for non-entity paths |
//! | [`verify`] | Verification phases and the countdown edge |
//! | [`presence`] | Local user, members, host election |
//! | [`camera`] | Points, camera offset, coordinate conversions |
//! | [`geom`] | Segment distance, circle tests, bounds |
//! | [`input`] | Tools, buttons, and gesture state |
//! | [`shapes`] | Parametric shape paths |
//! | [`cursor`] | Cursor broadcast throttle |
//! | [`render`] | Painter trait, scenes, rasterizer, snapshot export |
//! | [`consts`] | Shared constants |

pub mod battle;
pub mod camera;
pub mod clock;
pub mod consts;
pub mod cursor;
pub mod doc;
pub mod engine;
pub mod geom;
pub mod input;
pub mod presence;
pub mod records;
pub mod render;
pub mod shapes;
pub mod sync;
pub mod verify;
pub mod whiteboard;
