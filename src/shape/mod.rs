//! Load shape subsystem: the wave schedule and the controller that evaluates it.

pub mod schedule;
pub mod wave;

#[cfg(test)]
mod test_properties;
