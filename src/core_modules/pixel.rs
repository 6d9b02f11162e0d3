// THEORY (single-pixel heuristics):
// The `Pixel` module is the smallest unit of the detector. It is a "dumb" data
// container for one pixel in the detector's native channel order (blue, green,
// red) plus the handful of single-pixel measurements the color rules need.
// Nothing here looks at neighbours in space or time; that belongs to the mask
// filters and the heat map.
//
// Heuristic families:
// - Brightness: channel sum and intensity (arithmetic mean of B, G, R)
// - Spread:     chroma (max channel minus min channel), the "greyness" test
//               used by the smoke rule
//
// The same struct doubles as a drawing color, since annotation colors are
// expressed in the same channel order as the frame.

pub mod pixel {
    pub type Channel = u8;
    pub type ComputedChannel = f32;
    pub type Intensity = f32;
    pub type Sum = f32;
    pub type Chroma = u8;

    pub const CHANNELS: usize = 3;

    /// A single pixel with its channels stored in B, G, R order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Pixel {
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The red channel value (0-255).
        pub red: Channel,
    }

    /// Drawing colors share the pixel layout.
    pub type Bgr = Pixel;

    /// Rectangle color for confirmed flame blocks (red).
    pub const FLAME_COLOR: Bgr = Pixel::new(0, 0, 255);
    /// Rectangle color for confirmed smoke blocks (blue).
    pub const SMOKE_COLOR: Bgr = Pixel::new(255, 0, 0);

    impl Pixel {
        pub const fn new(blue: Channel, green: Channel, red: Channel) -> Self {
            Pixel { blue, green, red }
        }

        pub fn from_bgr_slice(bgr: &[Channel]) -> Self {
            Pixel::new(bgr[0], bgr[1], bgr[2])
        }

        pub fn to_array(self) -> [Channel; CHANNELS] {
            [self.blue, self.green, self.red]
        }

        /// Channels promoted to floating point, in (B, G, R) order.
        pub fn computed(&self) -> (ComputedChannel, ComputedChannel, ComputedChannel) {
            (
                self.blue as ComputedChannel,
                self.green as ComputedChannel,
                self.red as ComputedChannel,
            )
        }

        /// Sum of the three channels without 8-bit wraparound.
        pub fn sum(&self) -> Sum {
            let (b, g, r) = self.computed();
            b + g + r
        }

        /// Intensity: the plain average of the three channels.
        pub fn intensity(&self) -> Intensity {
            self.sum() / 3.0
        }

        pub fn max_channel(&self) -> Channel {
            self.blue.max(self.green).max(self.red)
        }

        pub fn min_channel(&self) -> Channel {
            self.blue.min(self.green).min(self.red)
        }

        /// Chroma: spread between the strongest and weakest channel.
        /// A small chroma means the pixel is close to grey.
        pub fn chroma(&self) -> Chroma {
            self.max_channel() - self.min_channel()
        }

        pub fn is_black(&self) -> bool {
            self.blue == 0 && self.green == 0 && self.red == 0
        }
    }
}
