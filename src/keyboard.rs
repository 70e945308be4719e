use minifb::Key;

/// Which of the 16 logical keys are held right now. Overwritten on every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Keypad {
    keys: [bool; 16],
}

impl Keypad {
    pub fn new() -> Self {
        Self { keys: [false; 16] }
    }

    pub fn reset(&mut self) {
        self.keys = [false; 16];
    }

    pub fn set(&mut self, key: u8, held: bool) {
        if let Some(latch) = self.keys.get_mut(key as usize) {
            *latch = held;
        }
    }

    pub fn update_from_host(&mut self, held: &[Key]) {
        self.reset();
        for &key in held {
            if let Some(num) = key_to_num(key) {
                self.set(num, true);
            }
        }
    }

    // there is no key above 0xF, so it is never held
    pub fn is_pressed(&self, n: u8) -> bool {
        self.keys.get(n as usize).copied().unwrap_or(false)
    }

    pub fn first_pressed(&self) -> Option<u8> {
        self.keys.iter().position(|&held| held).map(|k| k as u8)
    }
}

/// The COSMAC VIP hex keypad laid onto the left four columns of a keyboard.
/// ```text
/// |1|2|3|C|      |1|2|3|4|
/// |4|5|6|D|  ->  |Q|W|E|R|
/// |7|8|9|E|  ->  |A|S|D|F|
/// |A|0|B|F|      |Z|X|C|V|
/// ```
pub fn key_to_num(key: Key) -> Option<u8> {
    match key {
        Key::X => Some(0x0),
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::Z => Some(0xA),
        Key::C => Some(0xB),
        Key::Key4 => Some(0xC),
        Key::R => Some(0xD),
        Key::F => Some(0xE),
        Key::V => Some(0xF),
        _ => None,
    }
}
