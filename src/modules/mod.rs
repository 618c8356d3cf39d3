// src/modules/mod.rs

pub mod component;
pub mod flow_sensor;
pub mod heart_beat;
pub mod valve_control;
