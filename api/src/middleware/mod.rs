mod self_heal;

pub use self_heal::self_heal_middleware;
