pub mod pump_portal;
