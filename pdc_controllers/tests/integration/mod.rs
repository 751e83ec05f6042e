mod power_modes;
mod scheduler;
mod volume_lifecycle;
