//! Static search vocabulary and fallback images.

/// One term is drawn per resolution attempt and sent to every search provider.
pub const SEARCH_TERMS: &[&str] = &[
    "fantasy landscape magical forest",
    "ethereal mystical serene nature",
    "magical garden enchanted fairies",
    "dreamy fantasy art josephine wall",
    "mystical landscape peaceful elves",
    "enchanted forest fairy tale horses",
    "magical atmosphere serene cat",
    "fantasy world peaceful black labrador",
    "ethereal landscape fantasy art",
    "magical forest enchanted atmosphere",
    "dreamlike fantasy mystical garden",
    "serene fantasy art magical landscape",
    "enchanted mystical ethereal forest",
    "fairy tale fantasy magical dream",
    "mythical creatures nature peaceful",
    "josephine wall style fantasy art",
    "art nouveau magical landscape",
    "pre raphaelite fantasy serene",
    "fairy elves mystical forest",
    "magical horses enchanted meadow",
    "black labrador fantasy peaceful",
    "cat mystical serene garden",
    "mythical female creatures ethereal",
    "fairy tale magical atmosphere",
    "enchanted nature fantasy art",
];

/// Candidates whose description mentions one of these are preferred.
pub const RELEVANCE_KEYWORDS: &[&str] = &[
    "fantasy", "magical", "magic", "ethereal", "mystical", "mystery", "enchanted", "fairy",
    "dream", "surreal", "forest", "woods", "garden", "landscape", "nature", "peaceful",
    "serene", "calm", "tranquil", "beautiful", "artistic", "abstract", "water", "sky",
    "mountain", "flower", "tree", "light", "dark", "shadow", "wonder",
];

pub const CURATED_IMAGES: &[&str] = &[
    "https://images.pexels.com/photos/2386144/pexels-photo-2386144.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386154/pexels-photo-2386154.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386226/pexels-photo-2386226.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386227/pexels-photo-2386227.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386228/pexels-photo-2386228.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386229/pexels-photo-2386229.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386230/pexels-photo-2386230.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386231/pexels-photo-2386231.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386232/pexels-photo-2386232.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386233/pexels-photo-2386233.jpeg?w=800&h=800&fit=crop",
    "https://images.pexels.com/photos/2386234/pexels-photo-2386234.jpeg?w=800&h=800&fit=crop",
    "https://images.unsplash.com/photo-1518709268805-4e9042af2176?w=800&h=800&fit=crop",
    "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=800&h=800&fit=crop",
    "https://images.unsplash.com/photo-1441974231531-c6227db76b6e?w=800&h=800&fit=crop",
    "https://images.unsplash.com/photo-1447752875215-b2761acb3c5d?w=800&h=800&fit=crop",
    "https://images.unsplash.com/photo-1501594907352-04cda38ebc29?w=800&h=800&fit=crop",
    "https://images.unsplash.com/photo-1518837695005-2083093ee35b?w=800&h=800&fit=crop",
];

/// Last resort when everything else failed.
pub const LAST_RESORT_IMAGE: &str = "https://storage.googleapis.com/maker-studio-project-media-prod/1f79564f-a212-416b-a25e-046603a15231/images/2202650c-e63d-4c3e-8c83-7c089f929367.jpeg";
