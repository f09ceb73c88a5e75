use std::collections::VecDeque;

pub const MAX_LIGHT: u8 = 31;

/// One scalar light value stored per voxel. Lamp light carries three.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightComponent {
    Sun,
    Red,
    Green,
    Blue,
}

impl LightComponent {
    pub const ALL: [LightComponent; 4] = [
        LightComponent::Sun,
        LightComponent::Red,
        LightComponent::Green,
        LightComponent::Blue,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Packed 5:5:5 RGB lamp light.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LampColor(pub u16);

impl LampColor {
    #[inline]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        let m = u16::from(MAX_LIGHT);
        Self(((u16::from(r) & m) << 10) | ((u16::from(g) & m) << 5) | (u16::from(b) & m))
    }

    #[inline]
    pub fn r(self) -> u8 {
        ((self.0 >> 10) & 0x1F) as u8
    }

    #[inline]
    pub fn g(self) -> u8 {
        ((self.0 >> 5) & 0x1F) as u8
    }

    #[inline]
    pub fn b(self) -> u8 {
        (self.0 & 0x1F) as u8
    }

    /// Channel value; `Sun` is not part of lamp light and reads as 0.
    #[inline]
    pub fn get(self, c: LightComponent) -> u8 {
        match c {
            LightComponent::Sun => 0,
            LightComponent::Red => self.r(),
            LightComponent::Green => self.g(),
            LightComponent::Blue => self.b(),
        }
    }

    #[inline]
    pub fn with(self, c: LightComponent, v: u8) -> Self {
        match c {
            LightComponent::Sun => self,
            LightComponent::Red => Self::new(v, self.g(), self.b()),
            LightComponent::Green => Self::new(self.r(), v, self.b()),
            LightComponent::Blue => Self::new(self.r(), self.g(), v),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightNode {
    pub index: u32,
    /// Intensity before removal. Unused by addition nodes, which read the voxel.
    pub level: u8,
}

#[derive(Debug, Default)]
pub struct ChannelQueues {
    pub add: VecDeque<LightNode>,
    pub remove: VecDeque<LightNode>,
}

impl ChannelQueues {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Pending add/remove work for all four components of one chunk.
#[derive(Debug, Default)]
pub struct LightQueues {
    channels: [ChannelQueues; 4],
}

impl LightQueues {
    #[inline]
    pub fn channel(&self, c: LightComponent) -> &ChannelQueues {
        &self.channels[c.index()]
    }

    #[inline]
    pub fn channel_mut(&mut self, c: LightComponent) -> &mut ChannelQueues {
        &mut self.channels[c.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(ChannelQueues::is_empty)
    }

    pub fn clear(&mut self) {
        for ch in &mut self.channels {
            ch.add.clear();
            ch.remove.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamp_color_packs_components() {
        let c = LampColor::new(31, 7, 0);
        assert_eq!((c.r(), c.g(), c.b()), (31, 7, 0));
        let d = c.with(LightComponent::Blue, 12).with(LightComponent::Red, 1);
        assert_eq!((d.r(), d.g(), d.b()), (1, 7, 12));
        assert_eq!(d.get(LightComponent::Sun), 0);
    }
}
