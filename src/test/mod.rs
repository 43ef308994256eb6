mod config;
mod queues;
mod scenario;
mod sim_time;
mod simulator;
