pub mod shared {
    pub mod bounding_box;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod recognition {
    pub mod domain {
        pub mod classifier;
        pub mod decision_policy;
        pub mod embedding_extractor;
        pub mod face_filter;
        pub mod face_preprocessor;
        pub mod recognition_tally;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod frame_source;
        pub mod video_source;
    }
    pub mod infrastructure;
}

pub mod annotation {
    pub mod domain {
        pub mod display_surface;
        pub mod frame_annotator;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod frame_outcome;
    pub mod pipeline_logger;
    pub mod recognition_config;
    pub mod recognize_faces_use_case;
}
