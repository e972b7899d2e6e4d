//! # Petri 网核心定义（Place/Transition Net）
//!
//! 设库所集合 `P` 与迁移集合 `T`，输入/输出映射 `Pre, Post ∈ ℕ^{|P|×|T|}`，
//! 迁移效应矩阵 `C = Post - Pre`。标识 `M ∈ (ℕ ∪ {ω})^{|P|}`：
//!
//! * 迁移 `t` **可激发** 当且仅当 `∀p ∈ P: M[p] ≥ Pre[p, t]`（`ω` 总满足）；
//! * 发射后 `M' = M + C[:, t]`，`ω` 分量保持 `ω`，有限值溢出记为 `ω`。
//!
//! 激发规则本身（禁用迁移、容量约束、ω 加宽）位于 [`crate::analysis::firing`]。
//!
//! ## 示例
//!
//! ```rust
//! use pn_reach::net::*;
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new_with_tokens("p0", 1));
//! let p1 = net.add_place(Place::new("p1"));
//! let t0 = net.add_transition(Transition::new("t0"));
//!
//! net.add_input_arc(p0, t0, 1).unwrap();
//! net.add_output_arc(p1, t0, 1).unwrap();
//!
//! assert_eq!(net.initial_marking(), Marking::from_weights([1, 0]));
//! assert_eq!(*net.c_matrix().get(p1, t0), 1);
//! ```

pub mod core;
pub mod ids;
pub mod incidence;
pub mod index_vec;
pub mod io;
pub mod marking;
pub mod structure;

pub use core::{Net, NetError};
pub use ids::{PlaceId, TransitionId};
pub use incidence::Incidence;
pub use index_vec::{Idx, IndexVec};
pub use marking::{Marking, MarkingError, Tokens};
pub use structure::{Arc, ArcDirection, Place, Transition, Weight};
