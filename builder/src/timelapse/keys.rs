/// File name of the timelapse for a day folder, e.g. "2024-03-01_timelapse.mp4".
pub fn video_file_name(date: &str) -> String {
    format!("{date}_timelapse.mp4")
}

/// Local directory holding the copied images for a camera.
pub fn image_dir_name(camera: &str) -> String {
    format!("{camera}_temp_images")
}

/// Local directory holding the encoded videos for a camera.
pub fn video_dir_name(camera: &str) -> String {
    format!("{camera}_timelapse")
}

/// Object key for an uploaded timelapse.
/// e.g. "timelapse/frontyard/2024-03-01_timelapse.mp4"
pub fn video_key(prefix: &str, camera: &str, date: &str) -> String {
    format!("{prefix}{camera}/{file}", file = video_file_name(date))
}
