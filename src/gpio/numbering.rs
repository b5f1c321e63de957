//! Physical header (BOARD) to Broadcom (BCM) pin translation.

use crate::core::{ButtonsError, ButtonsResult, PinNumbering};

/// `(board, bcm)` pairs for the 40-pin header. Power and ground pins are absent.
const BOARD_TO_BCM: [(u8, u8); 28] = [
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// BCM number of a physical header pin, if it carries a GPIO line.
pub fn board_to_bcm(board: u8) -> Option<u8> {
    BOARD_TO_BCM.iter().find(|(b, _)| *b == board).map(|(_, bcm)| *bcm)
}

/// Translate a configured pin number to BCM.
pub fn resolve_pin(pin: u8, numbering: PinNumbering) -> ButtonsResult<u8> {
    match numbering {
        PinNumbering::Bcm => Ok(pin),
        PinNumbering::Board => board_to_bcm(pin).ok_or(ButtonsError::InvalidPin(i64::from(pin))),
    }
}
