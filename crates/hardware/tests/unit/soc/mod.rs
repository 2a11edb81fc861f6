/// RC settling of analog nodes.
pub mod analog;

/// Digital node resolution.
pub mod digital;

/// Serial EEPROM behind the two-wire engine.
pub mod eeprom;

/// Port register read/write split.
pub mod port;
