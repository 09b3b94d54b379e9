//! The OpenGEX structure vocabulary.

use std::fmt;

macro_rules! identifiers {
    ($($variant:ident),* $(,)?) => {
        /// An OpenGEX structure identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Identifier {
            $($variant),*
        }

        /// Every identifier, in table order.
        pub const IDENTIFIERS: &[Identifier] = &[$(Identifier::$variant),*];

        impl Identifier {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Identifier::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

identifiers! {
    Animation,
    Atten,
    BoneCountArray,
    BoneIndexArray,
    BoneNode,
    BoneRefArray,
    BoneWeightArray,
    CameraNode,
    CameraObject,
    Clip,
    Color,
    Extension,
    GeometryNode,
    GeometryObject,
    IndexArray,
    Key,
    LightNode,
    LightObject,
    Material,
    MaterialRef,
    Mesh,
    Metric,
    Morph,
    MorphWeight,
    Name,
    Node,
    ObjectRef,
    Param,
    Rotation,
    Scale,
    Skeleton,
    Skin,
    Spectrum,
    Texture,
    Time,
    Track,
    Transform,
    Translation,
    Value,
    VertexArray,
}

impl Identifier {
    /// Table index of this identifier.
    pub fn id(self) -> usize {
        self as usize
    }

    pub fn from_word(word: &[u8]) -> Option<Identifier> {
        IDENTIFIERS
            .iter()
            .copied()
            .find(|identifier| identifier.as_str().as_bytes() == word)
    }

    /// Node-like structures that become scene nodes.
    pub fn is_node(self) -> bool {
        matches!(
            self,
            Identifier::Node
                | Identifier::BoneNode
                | Identifier::GeometryNode
                | Identifier::CameraNode
                | Identifier::LightNode
        )
    }

    /// Structures that contribute to a node's local transform.
    pub fn is_transform(self) -> bool {
        matches!(
            self,
            Identifier::Transform | Identifier::Translation | Identifier::Rotation | Identifier::Scale
        )
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
