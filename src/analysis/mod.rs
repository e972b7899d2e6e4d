//! 标识空间上的分析：激发规则、搜索树、可达/覆盖图、不变量、启发式与有界性。
pub mod boundness;
pub mod firing;
pub mod heuristic;
pub mod invariants;
pub mod reachability;
pub mod search_tree;
