// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Tagged leaf values.

use crate::codec::{Codec, KeyContext};

#[cfg(test)]
#[path = "./node_test.rs"]
mod node_test;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeText {
    /// Already encoded, as read from a stack file.
    Stored(String),
    /// Plaintext waiting to be encoded on write.
    Pending(String),
}

/// A leaf value carrying the codec it is stored with.
///
/// Nodes read from disk keep their stored text and are written back
/// verbatim, so repeated writes never encode twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedNode {
    codec: Codec,
    text: NodeText,
}

impl TypedNode {
    /// A node holding text that is already encoded with `codec`.
    pub fn stored<S: Into<String>>(codec: Codec, encoded: S) -> Self {
        Self {
            codec,
            text: NodeText::Stored(encoded.into()),
        }
    }

    /// A node holding plaintext that `codec` will encode when written.
    pub fn pending<S: Into<String>>(codec: Codec, plaintext: S) -> Self {
        Self {
            codec,
            text: NodeText::Pending(plaintext.into()),
        }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.text, NodeText::Pending(_))
    }

    /// The text as held, encoded or not.
    pub fn raw(&self) -> &str {
        match &self.text {
            NodeText::Stored(text) | NodeText::Pending(text) => text,
        }
    }

    /// The plaintext, or the stored text when it cannot be decoded.
    pub fn resolve(&self, keys: &KeyContext) -> String {
        match &self.text {
            NodeText::Stored(encoded) => self.codec.decode(encoded, keys),
            NodeText::Pending(plaintext) => plaintext.clone(),
        }
    }

    /// The text to write to a stack file.
    pub fn encoded(&self, keys: &KeyContext) -> crate::Result<String> {
        match &self.text {
            NodeText::Stored(encoded) => Ok(encoded.clone()),
            NodeText::Pending(plaintext) => self.codec.encode(plaintext, keys),
        }
    }

    /// Encode pending text now, producing a stored node.
    pub fn seal(&self, keys: &KeyContext) -> crate::Result<TypedNode> {
        Ok(Self::stored(self.codec, self.encoded(keys)?))
    }
}
